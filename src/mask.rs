//! # Validity Mask
//!
//! NetCDF marks absent measurements through variable attributes rather than a
//! separate mask array. [`MaskRule`] collects those attributes once per
//! variable and decides, value by value, whether a cell is masked.
//!
//! A raw value is masked when it equals `_FillValue` or any `missing_value`,
//! falls outside `valid_range` (or `valid_min`/`valid_max`), or is NaN.
//! Without a `_FillValue` attribute the library's default fill for the
//! variable type applies, since that is what never-written cells read back
//! as. Byte and char variables have no default fill mask.
//! Unmasked values are unpacked with `scale_factor` and `add_offset`.

use log::debug;
use netcdf::types::{FloatType, IntType, NcVariableType};

// Default fill values of the netCDF C library (netcdf.h)
const NC_FILL_SHORT: i16 = -32767;
const NC_FILL_USHORT: u16 = 65535;
const NC_FILL_INT: i32 = -2147483647;
const NC_FILL_UINT: u32 = 4294967295;
const NC_FILL_INT64: i64 = -9223372036854775806;
const NC_FILL_UINT64: u64 = 18446744073709551614;
const NC_FILL_FLOAT: f32 = 9.969_209_968_386_869e36;
const NC_FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;

/// Masking and unpacking rules for one measurement variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskRule {
    pub fill_value: Option<f64>,
    pub missing_values: Vec<f64>,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
}

impl MaskRule {
    /// Builds the rule from the attributes of a NetCDF variable.
    pub fn from_variable(var: &netcdf::Variable) -> Self {
        let mut rule = MaskRule {
            fill_value: attribute_numbers(var, "_FillValue")
                .first()
                .copied()
                .or_else(|| default_fill_value(&var.vartype())),
            missing_values: attribute_numbers(var, "missing_value"),
            valid_min: attribute_numbers(var, "valid_min").first().copied(),
            valid_max: attribute_numbers(var, "valid_max").first().copied(),
            scale_factor: attribute_numbers(var, "scale_factor").first().copied(),
            add_offset: attribute_numbers(var, "add_offset").first().copied(),
        };

        // valid_range takes precedence over valid_min/valid_max
        let valid_range = attribute_numbers(var, "valid_range");
        if let [low, high] = valid_range[..] {
            rule.valid_min = Some(low);
            rule.valid_max = Some(high);
        }

        debug!("Mask rule for '{}': {:?}", var.name(), rule);
        rule
    }

    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_valid_range(mut self, low: f64, high: f64) -> Self {
        self.valid_min = Some(low);
        self.valid_max = Some(high);
        self
    }

    pub fn with_packing(mut self, scale_factor: f64, add_offset: f64) -> Self {
        self.scale_factor = Some(scale_factor);
        self.add_offset = Some(add_offset);
        self
    }

    /// Returns `true` when the raw stored value marks an absent measurement.
    pub fn is_masked(&self, raw: f64) -> bool {
        if raw.is_nan() {
            return true;
        }
        if self.fill_value == Some(raw) {
            return true;
        }
        if self.missing_values.contains(&raw) {
            return true;
        }
        if self.valid_min.is_some_and(|min| raw < min) {
            return true;
        }
        self.valid_max.is_some_and(|max| raw > max)
    }

    /// Applies the rule to a raw value: `None` when masked, otherwise the
    /// unpacked measurement.
    pub fn apply(&self, raw: f64) -> Option<f64> {
        if self.is_masked(raw) {
            return None;
        }
        Some(raw * self.scale_factor.unwrap_or(1.0) + self.add_offset.unwrap_or(0.0))
    }
}

/// Default fill value of a variable type, widened to `f64` the same way the
/// stored values are when read.
pub fn default_fill_value(vartype: &NcVariableType) -> Option<f64> {
    match vartype {
        NcVariableType::Int(IntType::I16) => Some(NC_FILL_SHORT as f64),
        NcVariableType::Int(IntType::U16) => Some(NC_FILL_USHORT as f64),
        NcVariableType::Int(IntType::I32) => Some(NC_FILL_INT as f64),
        NcVariableType::Int(IntType::U32) => Some(NC_FILL_UINT as f64),
        NcVariableType::Int(IntType::I64) => Some(NC_FILL_INT64 as f64),
        NcVariableType::Int(IntType::U64) => Some(NC_FILL_UINT64 as f64),
        NcVariableType::Float(FloatType::F32) => Some(NC_FILL_FLOAT as f64),
        NcVariableType::Float(FloatType::F64) => Some(NC_FILL_DOUBLE),
        _ => None,
    }
}

/// Reads a numeric attribute of any NetCDF type as a list of `f64`.
///
/// Missing, unreadable or textual attributes yield an empty list.
fn attribute_numbers(var: &netcdf::Variable, name: &str) -> Vec<f64> {
    use netcdf::AttributeValue as A;

    let Some(Ok(value)) = var.attribute_value(name) else {
        return Vec::new();
    };

    match value {
        A::Uchar(v) => vec![v as f64],
        A::Schar(v) => vec![v as f64],
        A::Ushort(v) => vec![v as f64],
        A::Short(v) => vec![v as f64],
        A::Uint(v) => vec![v as f64],
        A::Int(v) => vec![v as f64],
        A::Ulonglong(v) => vec![v as f64],
        A::Longlong(v) => vec![v as f64],
        A::Float(v) => vec![v as f64],
        A::Double(v) => vec![v],
        A::Uchars(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Schars(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Ushorts(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Shorts(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Uints(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Ints(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Ulonglongs(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Longlongs(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Floats(v) => v.into_iter().map(|x| x as f64).collect(),
        A::Doubles(v) => v,
        _ => Vec::new(),
    }
}
