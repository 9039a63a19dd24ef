use super::normalizer::{
    normalize_amount, normalize_flag, normalize_text, normalize_unit, Normalized,
};
use super::record::{FormFlags, QuantityUnit};
use super::EstimateError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Inference output as received. Every scalar stays a raw JSON value until normalized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawEstimate {
    #[serde(deserialize_with = "lenient_ward_entries")]
    ward_breakdown: Vec<RawWardEntry>,
    ward_unit_cost_subq: Value,
    ward_quantity_subq_1: Value,
    or_type: Value,
    or_charging_block_hours: Value,
    or_unit_cost_first_block: Value,
    or_unit_cost_subq: Value,
    or_quantity_subq_1: Value,
    or_charges: Value,
    or_dtf: Value,
    dtf: Value,
    consultation_fee: Value,
    procedure_fee: Value,
    anaesthetist_fee: Value,
    doctor_prescribed_charges: Value,
    ancillary_charges_llm: Value,
    estimated_medisave_claimable: Value,
    #[serde(deserialize_with = "lenient_list")]
    consumables_list: Vec<Value>,
    backup_logic_flag: Value,
    manual_flag: Value,
    warning_flag: Value,
    patched_flag: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawWardEntry {
    ward_type: Value,
    length_of_stay: Value,
    ward_quantity_unit: Value,
    ward_unit_cost_first_block: Value,
    ward_unit_cost_subq: Value,
    ward_quantity_subq_1: Value,
    ward_charges: Value,
    ward_dtf_total: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WardEntry {
    pub ward_type: Option<String>,
    pub length_of_stay: Normalized,
    pub quantity_unit: Option<QuantityUnit>,
    pub first_block_rate: Normalized,
    pub subsequent_rate: Normalized,
    pub subsequent_quantity: Normalized,
    pub charges: Normalized,
    pub dtf_total: Normalized,
}

impl WardEntry {
    pub fn is_valid(&self) -> bool {
        self.ward_type.is_some()
    }

    pub fn label(&self) -> &str {
        self.ward_type.as_deref().unwrap_or_default()
    }

    pub fn unit_or_default(&self) -> QuantityUnit {
        self.quantity_unit.unwrap_or(QuantityUnit::Days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperatingRoom {
    pub or_type: Option<String>,
    pub charging_block_hours: Normalized,
    pub first_block_rate: Normalized,
    pub subsequent_rate: Normalized,
    pub subsequent_quantity: Normalized,
    pub charges: Normalized,
    pub dtf_total: Normalized,
}

impl OperatingRoom {
    pub fn is_present(&self) -> bool {
        self.or_type.is_some()
    }

    pub fn label(&self) -> &str {
        self.or_type.as_deref().unwrap_or_default()
    }
}

/// A normalized inference output: the input to classification and derivation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Estimate {
    pub wards: Vec<WardEntry>,
    pub ward_subsequent_rate: Normalized,
    pub ward_subsequent_quantity: Normalized,
    pub operating_room: OperatingRoom,
    pub dtf_total: Normalized,
    pub consultation_fee: Normalized,
    pub procedure_fee: Normalized,
    pub anaesthetist_fee: Normalized,
    pub prescribed_charges: Normalized,
    pub ancillary_charges: Normalized,
    pub medisave_claimable: Normalized,
    pub consumables: Vec<Value>,
    pub flags: FormFlags,
}

impl Estimate {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EstimateError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Rejects anything that is not a JSON object; everything else is normalized.
    pub fn from_value(value: Value) -> Result<Self, EstimateError> {
        if !value.is_object() {
            return Err(EstimateError::NotAnObject {
                found: json_kind(&value),
            });
        }

        let raw: RawEstimate = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw))
    }

    /// Ward entries whose type survives trimming, in payload order.
    pub fn valid_wards(&self) -> impl Iterator<Item = &WardEntry> {
        self.wards.iter().filter(|entry| entry.is_valid())
    }

    fn from_raw(raw: RawEstimate) -> Self {
        let wards = raw
            .ward_breakdown
            .iter()
            .map(|entry| WardEntry {
                ward_type: normalize_text(&entry.ward_type),
                length_of_stay: normalize_amount(&entry.length_of_stay),
                quantity_unit: normalize_unit(&entry.ward_quantity_unit),
                first_block_rate: normalize_amount(&entry.ward_unit_cost_first_block),
                subsequent_rate: normalize_amount(&entry.ward_unit_cost_subq),
                subsequent_quantity: normalize_amount(&entry.ward_quantity_subq_1),
                charges: normalize_amount(&entry.ward_charges),
                dtf_total: normalize_amount(&entry.ward_dtf_total),
            })
            .collect();

        Self {
            wards,
            ward_subsequent_rate: normalize_amount(&raw.ward_unit_cost_subq),
            ward_subsequent_quantity: normalize_amount(&raw.ward_quantity_subq_1),
            operating_room: OperatingRoom {
                or_type: normalize_text(&raw.or_type),
                charging_block_hours: normalize_amount(&raw.or_charging_block_hours),
                first_block_rate: normalize_amount(&raw.or_unit_cost_first_block),
                subsequent_rate: normalize_amount(&raw.or_unit_cost_subq),
                subsequent_quantity: normalize_amount(&raw.or_quantity_subq_1),
                charges: normalize_amount(&raw.or_charges),
                dtf_total: normalize_amount(&raw.or_dtf),
            },
            dtf_total: normalize_amount(&raw.dtf),
            consultation_fee: normalize_amount(&raw.consultation_fee),
            procedure_fee: normalize_amount(&raw.procedure_fee),
            anaesthetist_fee: normalize_amount(&raw.anaesthetist_fee),
            prescribed_charges: normalize_amount(&raw.doctor_prescribed_charges),
            ancillary_charges: normalize_amount(&raw.ancillary_charges_llm),
            medisave_claimable: normalize_amount(&raw.estimated_medisave_claimable),
            consumables: raw.consumables_list,
            flags: FormFlags {
                backup_logic: normalize_flag(&raw.backup_logic_flag),
                manual: normalize_flag(&raw.manual_flag),
                warning: normalize_flag(&raw.warning_flag),
                patched: normalize_flag(&raw.patched_flag),
            },
        }
    }
}

// Non-object entries still count as entries, just never valid ones.
fn lenient_ward_entries<'de, D>(deserializer: D) -> Result<Vec<RawWardEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(_) => serde_json::from_value(item).unwrap_or_default(),
            _ => RawWardEntry::default(),
        })
        .collect())
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
