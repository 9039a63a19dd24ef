use super::classifier::Classification;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityUnit {
    Days,
    Hours,
}

impl QuantityUnit {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Days => "Day(s)",
            Self::Hours => "Hour(s)",
        }
    }
}

/// How a row's rate relates to its line total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum RateBasis {
    /// A single first-block charge.
    Flat,
    /// A daily rate over a stay of `days`.
    PerDay { days: Decimal },
    /// Additional blocks beyond the first.
    Subsequent {
        quantity: Decimal,
        unit: QuantityUnit,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRow {
    pub label: String,
    pub rate: Decimal,
    #[serde(flatten)]
    pub basis: RateBasis,
    pub total: Decimal,
}

impl ChargeRow {
    /// Block count, carried only by subsequent-block rows.
    pub fn quantity(&self) -> Option<Decimal> {
        match self.basis {
            RateBasis::Subsequent { quantity, .. } => Some(quantity),
            RateBasis::Flat | RateBasis::PerDay { .. } => None,
        }
    }

    pub fn is_subsequent_block(&self) -> bool {
        matches!(self.basis, RateBasis::Subsequent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    Present(ChargeRow),
    #[default]
    Absent,
}

impl Slot {
    pub fn row(&self) -> Option<&ChargeRow> {
        match self {
            Slot::Present(row) => Some(row),
            Slot::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Slot::Present(_))
    }
}

impl From<Option<ChargeRow>> for Slot {
    fn from(row: Option<ChargeRow>) -> Self {
        row.map_or(Slot::Absent, Slot::Present)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorFees {
    pub consultation: Decimal,
    pub procedure: Decimal,
    pub assistant_surgeon: Decimal,
    pub anaesthetist: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormTotals {
    pub doctors_fees: Decimal,
    pub hospital_charges: Decimal,
    pub grand_total: Decimal,
    pub deposit_required: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FormFlags {
    pub backup_logic: bool,
    pub manual: bool,
    pub warning: bool,
    pub patched: bool,
}

/// Numeric form for one inference output, every amount already rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormRecord {
    pub job_id: String,
    pub source_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fa_number: Option<String>,
    pub classification: Classification,
    pub doctors_fees: DoctorFees,
    #[serde(serialize_with = "present_rows")]
    pub accommodation: [Slot; 3],
    #[serde(serialize_with = "present_rows")]
    pub dtf: [Slot; 2],
    pub dtf_total: Decimal,
    pub ancillary_charges: Decimal,
    pub medisave_claimable: Decimal,
    pub totals: FormTotals,
    pub flags: FormFlags,
    pub consumables: Vec<Value>,
}

impl FormRecord {
    pub fn accommodation_rows(&self) -> impl Iterator<Item = &ChargeRow> {
        self.accommodation.iter().filter_map(Slot::row)
    }

    pub fn dtf_rows(&self) -> impl Iterator<Item = &ChargeRow> {
        self.dtf.iter().filter_map(Slot::row)
    }
}

fn present_rows<S>(slots: &[Slot], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(slots.iter().filter_map(Slot::row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn subsequent_row() -> ChargeRow {
        ChargeRow {
            label: "Cardiovascular Suite (Subsequent Hour or Part Thereof)".to_string(),
            rate: dec!(55.05),
            basis: RateBasis::Subsequent {
                quantity: dec!(2),
                unit: QuantityUnit::Hours,
            },
            total: dec!(110.10),
        }
    }

    #[test]
    fn only_subsequent_rows_carry_a_quantity() {
        let first = ChargeRow {
            label: "Private".to_string(),
            rate: dec!(806.42),
            basis: RateBasis::PerDay { days: dec!(4) },
            total: dec!(3225.68),
        };
        assert_eq!(first.quantity(), None);
        assert!(!first.is_subsequent_block());

        let subsequent = subsequent_row();
        assert_eq!(subsequent.quantity(), Some(dec!(2)));
        assert!(subsequent.is_subsequent_block());
    }

    #[test]
    fn rows_serialize_basis_inline() {
        let value = serde_json::to_value(subsequent_row()).expect("row serializes");
        assert_eq!(value["basis"], "subsequent");
        assert_eq!(value["unit"], "hours");
        assert_eq!(value["quantity"], "2");
        assert_eq!(value["total"], "110.10");
    }

    #[test]
    fn slot_from_option() {
        assert_eq!(Slot::from(None), Slot::Absent);
        assert!(Slot::from(Some(subsequent_row())).is_present());
    }
}
