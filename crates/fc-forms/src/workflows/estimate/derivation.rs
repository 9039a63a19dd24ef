use super::classifier::{Classification, FormTemplate};
use super::normalizer::{money, round_money, within_limit, Normalized};
use super::payload::{Estimate, OperatingRoom, WardEntry};
use super::record::{
    ChargeRow, DoctorFees, FormRecord, FormTotals, QuantityUnit, RateBasis, Slot,
};
use rust_decimal::{Decimal, RoundingStrategy};

pub const WARD_SUBSEQUENT_SUFFIX: &str = "-PER SUBQ";
pub const OR_SUBSEQUENT_SUFFIX: &str = " (Subsequent Hour or Part Thereof)";
pub const DAY_SUITE_TREATMENT_FEE: &str = "TREATMENT FEE-DAY SUITE";

/// Values supplied by the caller rather than read from the inference output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormContext {
    pub job_id: String,
    pub source_reference: String,
    pub fa_number: Option<String>,
    pub assistant_surgeon_fee: Decimal,
}

impl FormContext {
    pub fn new(job_id: impl Into<String>, source_reference: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            source_reference: source_reference.into(),
            ..Self::default()
        }
    }

    pub fn with_fa_number(mut self, fa_number: Option<String>) -> Self {
        self.fa_number = fa_number;
        self
    }

    pub fn with_assistant_surgeon_fee(mut self, fee: Decimal) -> Self {
        self.assistant_surgeon_fee = fee;
        self
    }
}

/// Builds the numeric form for an estimate under its classification.
pub fn derive(
    estimate: &Estimate,
    classification: &Classification,
    context: &FormContext,
) -> FormRecord {
    let template = classification.template;
    let doctors_fees = doctor_fees(estimate, context.assistant_surgeon_fee);
    let accommodation = accommodation_slots(estimate, template);

    let dtf_total = money(estimate.dtf_total);
    let dtf = dtf_slots(estimate, template, dtf_total);
    let ancillary_charges = ancillary_charges(estimate, classification.has_ward);

    let accommodation_total = sum_money(
        accommodation
            .iter()
            .filter_map(Slot::row)
            .map(|row| row.total),
    );
    let hospital_charges = sum_money([accommodation_total, dtf_total, ancillary_charges]);
    let grand_total = sum_money([doctors_fees.total, hospital_charges]);
    let medisave_claimable = money(estimate.medisave_claimable);
    let deposit_required = difference(grand_total, medisave_claimable);

    FormRecord {
        job_id: context.job_id.clone(),
        source_reference: context.source_reference.clone(),
        fa_number: context.fa_number.clone(),
        classification: *classification,
        totals: FormTotals {
            doctors_fees: doctors_fees.total,
            hospital_charges,
            grand_total,
            deposit_required,
        },
        doctors_fees,
        accommodation,
        dtf,
        dtf_total,
        ancillary_charges,
        medisave_claimable,
        flags: estimate.flags,
        consumables: estimate.consumables.clone(),
    }
}

fn doctor_fees(estimate: &Estimate, assistant_surgeon_fee: Decimal) -> DoctorFees {
    let consultation = money(estimate.consultation_fee);
    let procedure = money(estimate.procedure_fee);
    let anaesthetist = money(estimate.anaesthetist_fee);
    let assistant_surgeon = if within_limit(assistant_surgeon_fee) {
        round_money(assistant_surgeon_fee)
    } else {
        Decimal::ZERO
    };

    DoctorFees {
        consultation,
        procedure,
        assistant_surgeon,
        anaesthetist,
        total: sum_money([consultation, procedure, anaesthetist, assistant_surgeon]),
    }
}

// OR charges only fold into ancillary when a ward carries the stay.
fn ancillary_charges(estimate: &Estimate, has_ward: bool) -> Decimal {
    let or_charges = if has_ward {
        money(estimate.operating_room.charges)
    } else {
        Decimal::ZERO
    };

    sum_money([
        money(estimate.ancillary_charges),
        money(estimate.prescribed_charges),
        or_charges,
    ])
}

fn accommodation_slots(estimate: &Estimate, template: FormTemplate) -> [Slot; 3] {
    let operating_room = &estimate.operating_room;
    let first_ward = estimate.valid_wards().next();

    let first = match template {
        FormTemplate::Unclassified => None,
        _ => first_ward.map(ward_first_block).or_else(|| {
            operating_room
                .is_present()
                .then(|| or_first_block(operating_room))
        }),
    };

    let (second, third) = match template {
        FormTemplate::WardAndOr => {
            let subsequent = operating_room
                .subsequent_rate
                .positive()
                .map(|_| or_subsequent_block(operating_room));
            (Some(or_first_block(operating_room)), subsequent)
        }
        FormTemplate::WardHoursTwoBlocks => (ward_second_block(estimate), None),
        FormTemplate::WardTwoTypes => (second_ward_type(estimate).map(ward_first_block), None),
        FormTemplate::OrTwoBlocks => (Some(or_subsequent_block(operating_room)), None),
        FormTemplate::Unclassified
        | FormTemplate::WardDays
        | FormTemplate::WardHoursSingleBlock
        | FormTemplate::OrSingleBlock => (None, None),
    };

    [first.into(), second.into(), third.into()]
}

fn dtf_slots(estimate: &Estimate, template: FormTemplate, dtf_total: Decimal) -> [Slot; 2] {
    let operating_room = &estimate.operating_room;
    let first_ward = estimate.valid_wards().next();

    let (first, second) = match (template, first_ward) {
        (FormTemplate::Unclassified, _) => (None, None),
        (FormTemplate::WardTwoTypes, Some(first)) => {
            let split = second_ward_type(estimate)
                .and_then(|second| split_dtf(first, second, dtf_total));
            match split {
                Some((first_row, second_row)) => (Some(first_row), Some(second_row)),
                None => (Some(ward_dtf_row(first, dtf_total)), None),
            }
        }
        (FormTemplate::WardAndOr, Some(ward)) => match operating_room.dtf_total.positive() {
            Some(or_dtf) => {
                let or_dtf = round_money(or_dtf);
                let ward_dtf = if ward.dtf_total.is_present() {
                    money(ward.dtf_total)
                } else {
                    difference(dtf_total, or_dtf)
                };
                (
                    Some(ward_dtf_row(ward, ward_dtf)),
                    Some(flat_treatment_fee(or_dtf)),
                )
            }
            None => (Some(ward_dtf_row(ward, dtf_total)), None),
        },
        (_, Some(ward)) => (Some(ward_dtf_row(ward, dtf_total)), None),
        (_, None) => (Some(flat_treatment_fee(dtf_total)), None),
    };

    [first.into(), second.into()]
}

/// Per-type DTF rows, only when both types carry a fee and the two add up
/// to the aggregate.
fn split_dtf(
    first: &WardEntry,
    second: &WardEntry,
    dtf_total: Decimal,
) -> Option<(ChargeRow, ChargeRow)> {
    let (Normalized::Present(first_dtf), Normalized::Present(second_dtf)) =
        (first.dtf_total, second.dtf_total)
    else {
        return None;
    };
    let (first_dtf, second_dtf) = (round_money(first_dtf), round_money(second_dtf));

    (first_dtf.checked_add(second_dtf) == Some(dtf_total)).then(|| {
        (
            ward_dtf_row(first, first_dtf),
            ward_dtf_row(second, second_dtf),
        )
    })
}

fn ward_first_block(entry: &WardEntry) -> ChargeRow {
    let rate = money(entry.first_block_rate);
    let basis = match (entry.unit_or_default(), stay_length(entry)) {
        (QuantityUnit::Days, Some(days)) => RateBasis::PerDay { days },
        _ => RateBasis::Flat,
    };

    ChargeRow {
        label: entry.label().to_string(),
        rate,
        basis,
        total: money(entry.charges),
    }
}

/// The block after the first for an hourly ward stay.
///
/// Priced from the subsequent-block rate when one exists (entry-level first,
/// then the top-level fields); otherwise the second ward entry stands in as
/// the subsequent block at its own rate and charge.
fn ward_second_block(estimate: &Estimate) -> Option<ChargeRow> {
    let mut valid = estimate.valid_wards();
    let first = valid.next()?;
    let second = valid.next();

    let subsequent_rate = first
        .subsequent_rate
        .positive()
        .or_else(|| estimate.ward_subsequent_rate.positive());

    match subsequent_rate {
        Some(rate) => {
            let rate = round_money(rate);
            let quantity = first
                .subsequent_quantity
                .positive()
                .or_else(|| estimate.ward_subsequent_quantity.positive())
                .or_else(|| second.and_then(stay_length))
                .unwrap_or(Decimal::ZERO);

            Some(ChargeRow {
                label: format!("{}{}", first.label(), WARD_SUBSEQUENT_SUFFIX),
                rate,
                basis: RateBasis::Subsequent {
                    quantity,
                    unit: first.unit_or_default(),
                },
                total: line_total(rate, quantity),
            })
        }
        None => second.map(|entry| ChargeRow {
            label: entry.label().to_string(),
            rate: money(entry.first_block_rate),
            basis: RateBasis::Subsequent {
                quantity: stay_length(entry).unwrap_or(Decimal::ZERO),
                unit: entry.unit_or_default(),
            },
            total: money(entry.charges),
        }),
    }
}

fn second_ward_type(estimate: &Estimate) -> Option<&WardEntry> {
    let mut valid = estimate.valid_wards();
    let first = valid.next()?;
    valid.find(|entry| entry.label() != first.label())
}

fn or_first_block(operating_room: &OperatingRoom) -> ChargeRow {
    let block_hours = operating_room
        .charging_block_hours
        .positive()
        .map(|hours| hours.trunc())
        .filter(|hours| !hours.is_zero());

    let label = match block_hours {
        Some(hours) => format!(
            "{} (First {} Hours)",
            operating_room.label(),
            hours.normalize()
        ),
        None => operating_room.label().to_string(),
    };
    let rate = money(operating_room.first_block_rate);

    ChargeRow {
        label,
        rate,
        basis: RateBasis::Flat,
        total: rate,
    }
}

fn or_subsequent_block(operating_room: &OperatingRoom) -> ChargeRow {
    let rate = money(operating_room.subsequent_rate);
    let quantity = operating_room.subsequent_quantity.value();

    ChargeRow {
        label: format!("{}{}", operating_room.label(), OR_SUBSEQUENT_SUFFIX),
        rate,
        basis: RateBasis::Subsequent {
            quantity,
            unit: QuantityUnit::Hours,
        },
        total: line_total(rate, quantity),
    }
}

fn ward_dtf_row(entry: &WardEntry, amount: Decimal) -> ChargeRow {
    let per_day = stay_length(entry)
        .and_then(|days| amount.checked_div(days).map(|rate| (days, rate)));

    match (entry.unit_or_default(), per_day) {
        (QuantityUnit::Days, Some((days, rate))) => ChargeRow {
            label: entry.label().to_string(),
            rate: round_money(rate),
            basis: RateBasis::PerDay { days },
            total: amount,
        },
        (QuantityUnit::Days, None) => ChargeRow {
            label: entry.label().to_string(),
            rate: amount,
            basis: RateBasis::Flat,
            total: amount,
        },
        (QuantityUnit::Hours, _) => flat_treatment_fee(amount),
    }
}

fn flat_treatment_fee(amount: Decimal) -> ChargeRow {
    ChargeRow {
        label: DAY_SUITE_TREATMENT_FEE.to_string(),
        rate: amount,
        basis: RateBasis::Flat,
        total: amount,
    }
}

/// Length of stay, falling back to charges over the first-block rate as a whole count.
fn stay_length(entry: &WardEntry) -> Option<Decimal> {
    if let Some(days) = entry.length_of_stay.positive() {
        return Some(days.normalize());
    }

    let rate = entry.first_block_rate.positive()?;
    let charges = entry.charges.positive()?;
    let derived = charges
        .checked_div(rate)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    (derived > Decimal::ZERO).then(|| derived.normalize())
}

// Arithmetic that would overflow degrades to zero instead of failing the form.
fn sum_money(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .map_or(Decimal::ZERO, round_money)
}

fn difference(minuend: Decimal, subtrahend: Decimal) -> Decimal {
    minuend
        .checked_sub(subtrahend)
        .map_or(Decimal::ZERO, round_money)
}

fn line_total(rate: Decimal, quantity: Decimal) -> Decimal {
    rate.checked_mul(quantity).map_or(Decimal::ZERO, round_money)
}
