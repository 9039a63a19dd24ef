use super::payload::Estimate;
use super::record::QuantityUnit;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// The eight mutually exclusive form layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormTemplate {
    Unclassified,
    WardAndOr,
    WardDays,
    WardHoursSingleBlock,
    WardHoursTwoBlocks,
    WardTwoTypes,
    OrSingleBlock,
    OrTwoBlocks,
}

impl FormTemplate {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Unclassified,
            Self::WardAndOr,
            Self::WardDays,
            Self::WardHoursSingleBlock,
            Self::WardHoursTwoBlocks,
            Self::WardTwoTypes,
            Self::OrSingleBlock,
            Self::OrTwoBlocks,
        ]
    }

    pub const fn id(self) -> u8 {
        match self {
            Self::Unclassified => 0,
            Self::WardAndOr => 1,
            Self::WardDays => 2,
            Self::WardHoursSingleBlock => 3,
            Self::WardHoursTwoBlocks => 4,
            Self::WardTwoTypes => 5,
            Self::OrSingleBlock => 6,
            Self::OrTwoBlocks => 7,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unclassified => "UNCLASSIFIED",
            Self::WardAndOr => "Ward + OR",
            Self::WardDays => "Ward only (days)",
            Self::WardHoursSingleBlock => "Ward only (hours, 1 block)",
            Self::WardHoursTwoBlocks => "Ward only (hours, 2 blocks)",
            Self::WardTwoTypes => "Ward only (2 types)",
            Self::OrSingleBlock => "OR only (1 block)",
            Self::OrTwoBlocks => "OR only (2 blocks)",
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ordered().into_iter().find(|template| template.id() == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub template: FormTemplate,
    pub has_ward: bool,
    pub has_or: bool,
    /// Ward entries with a non-blank type; blank or malformed entries are not counted.
    pub ward_count: usize,
    /// Unit of the first counted ward entry, `None` when it names none.
    pub ward_unit: Option<QuantityUnit>,
}

impl Serialize for Classification {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let field_count = if self.ward_unit.is_some() { 6 } else { 5 };
        let mut state = serializer.serialize_struct("Classification", field_count)?;
        state.serialize_field("template_id", &self.template.id())?;
        state.serialize_field("template_name", self.template.name())?;
        state.serialize_field("has_ward", &self.has_ward)?;
        state.serialize_field("has_or", &self.has_or)?;
        state.serialize_field("ward_count", &self.ward_count)?;
        if let Some(unit) = self.ward_unit {
            state.serialize_field("ward_unit", &unit)?;
        } else {
            state.skip_field("ward_unit")?;
        }
        state.end()
    }
}

struct WardShape {
    entries: usize,
    distinct_types: usize,
    unit: QuantityUnit,
}

struct OrShape {
    subsequent_block: bool,
}

/// Assigns exactly one template; malformed input falls through to `Unclassified`.
pub fn classify(estimate: &Estimate) -> Classification {
    let ward_unit = estimate.valid_wards().next().and_then(|entry| entry.quantity_unit);
    let ward = ward_shape(estimate, ward_unit);
    let operating_room = or_shape(estimate);

    // Arms are ordered by precedence; the first match wins.
    let template = match (&ward, &operating_room) {
        (Some(_), Some(_)) => FormTemplate::WardAndOr,
        (
            Some(WardShape {
                distinct_types: 2.., ..
            }),
            None,
        ) => FormTemplate::WardTwoTypes,
        (
            Some(WardShape {
                unit: QuantityUnit::Hours,
                entries: 2..,
                ..
            }),
            None,
        ) => FormTemplate::WardHoursTwoBlocks,
        (
            Some(WardShape {
                unit: QuantityUnit::Hours,
                ..
            }),
            None,
        ) => FormTemplate::WardHoursSingleBlock,
        (Some(_), None) => FormTemplate::WardDays,
        (
            None,
            Some(OrShape {
                subsequent_block: true,
            }),
        ) => FormTemplate::OrTwoBlocks,
        (None, Some(_)) => FormTemplate::OrSingleBlock,
        (None, None) => FormTemplate::Unclassified,
    };

    Classification {
        template,
        has_ward: ward.is_some(),
        has_or: operating_room.is_some(),
        ward_count: ward.as_ref().map_or(0, |shape| shape.entries),
        ward_unit,
    }
}

fn ward_shape(estimate: &Estimate, unit: Option<QuantityUnit>) -> Option<WardShape> {
    let mut entries = 0;
    let mut distinct = HashSet::new();
    for entry in estimate.valid_wards() {
        entries += 1;
        distinct.insert(entry.label());
    }

    (entries > 0).then(|| WardShape {
        entries,
        distinct_types: distinct.len(),
        unit: unit.unwrap_or(QuantityUnit::Days),
    })
}

fn or_shape(estimate: &Estimate) -> Option<OrShape> {
    let operating_room = &estimate.operating_room;
    if !operating_room.is_present() {
        return None;
    }

    let charged = operating_room.charges.positive().is_some()
        || operating_room.first_block_rate.positive().is_some();

    charged.then(|| OrShape {
        subsequent_block: operating_room.subsequent_rate.positive().is_some(),
    })
}
