use super::record::{ChargeRow, FormFlags, FormRecord, QuantityUnit, RateBasis};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

pub const MOH_BENCHMARK_UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountRowView {
    pub label: &'static str,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRowView {
    pub label: String,
    pub description: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorFeesView {
    pub rows: Vec<AmountRowView>,
    pub total: String,
    pub moh_benchmark: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HospitalChargesView {
    pub accommodation_rows: Vec<ChargeRowView>,
    pub daily_companion_rate: String,
    pub dtf_rows: Vec<ChargeRowView>,
    pub ancillary_charges: String,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotalsView {
    pub total_estimated_amount: String,
    pub estimated_medisave_claimable: String,
    pub deposit_required: String,
}

/// Display-ready form; rows are pre-filtered so consumers never branch on template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedForm {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fa_number: Option<String>,
    pub template_id: u8,
    pub template_name: &'static str,
    pub has_ward: bool,
    pub has_or: bool,
    pub ward_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ward_unit: Option<QuantityUnit>,
    pub doctors_fees: DoctorFeesView,
    pub hospital_charges: HospitalChargesView,
    pub totals: TotalsView,
    pub flags: FormFlags,
    pub consumables_list: Vec<Value>,
    pub source_reference: String,
}

pub fn render(record: &FormRecord) -> RenderedForm {
    let fees = &record.doctors_fees;
    let classification = &record.classification;

    RenderedForm {
        job_id: record.job_id.clone(),
        fa_number: record.fa_number.clone(),
        template_id: classification.template.id(),
        template_name: classification.template.name(),
        has_ward: classification.has_ward,
        has_or: classification.has_or,
        ward_count: classification.ward_count,
        ward_unit: classification.ward_unit,
        doctors_fees: DoctorFeesView {
            rows: vec![
                amount_row("Consultation Fee(s)", fees.consultation),
                amount_row("Procedure / Surgeon Fee(s)", fees.procedure),
                amount_row("Assistant Surgeon Fee(s)", fees.assistant_surgeon),
                amount_row("Anaesthetist Fee(s)", fees.anaesthetist),
            ],
            total: format_amount(fees.total),
            moh_benchmark: MOH_BENCHMARK_UNAVAILABLE,
        },
        hospital_charges: HospitalChargesView {
            accommodation_rows: record.accommodation_rows().map(charge_row).collect(),
            daily_companion_rate: format_amount(Decimal::ZERO),
            dtf_rows: record.dtf_rows().map(charge_row).collect(),
            ancillary_charges: format_amount(record.ancillary_charges),
            total: format_amount(record.totals.hospital_charges),
        },
        totals: TotalsView {
            total_estimated_amount: format_amount(record.totals.grand_total),
            estimated_medisave_claimable: format_amount(record.medisave_claimable),
            deposit_required: format_amount(record.totals.deposit_required),
        },
        flags: record.flags,
        consumables_list: record.consumables.clone(),
        source_reference: record.source_reference.clone(),
    }
}

/// Two decimals with comma-grouped thousands, e.g. `-1,234.50`.
pub fn format_amount(value: Decimal) -> String {
    let mut scaled = value;
    scaled.rescale(2);

    let negative = scaled.is_sign_negative() && !scaled.is_zero();
    let digits = scaled.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 + 4);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

pub fn describe(row: &ChargeRow) -> String {
    let rate = format_amount(row.rate);
    match row.basis {
        RateBasis::Flat => format!("$ {rate}"),
        RateBasis::PerDay { days } => format!(
            "$ {rate} x {} {}",
            format_quantity(days),
            QuantityUnit::Days.label()
        ),
        RateBasis::Subsequent { quantity, unit } => {
            format!("$ {rate} x {} {}", format_quantity(quantity), unit.label())
        }
    }
}

fn amount_row(label: &'static str, amount: Decimal) -> AmountRowView {
    AmountRowView {
        label,
        amount: format_amount(amount),
    }
}

fn charge_row(row: &ChargeRow) -> ChargeRowView {
    ChargeRowView {
        label: row.label.clone(),
        description: describe(row),
        amount: format_amount(row.total),
    }
}
