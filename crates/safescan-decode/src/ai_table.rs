//! GS1 Application Identifier table.

/// How many characters an AI's value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiLength {
    /// Exactly `n` characters, no separator needed.
    Fixed(usize),
    /// Up to `n` characters, terminated early by a separator.
    Variable(usize),
}

/// How an AI's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiValueType {
    Numeric,
    Alphanumeric,
    /// `YYMMDD`
    Date,
    /// Numeric with an implied number of decimal places.
    Decimal(u8),
}

/// One Application Identifier definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiSpec {
    pub code: &'static str,
    pub field: &'static str,
    pub length: AiLength,
    pub value_type: AiValueType,
}

const fn ai(
    code: &'static str,
    field: &'static str,
    length: AiLength,
    value_type: AiValueType,
) -> AiSpec {
    AiSpec {
        code,
        field,
        length,
        value_type,
    }
}

use AiLength::{Fixed, Variable};
use AiValueType::{Alphanumeric, Date, Decimal, Numeric};

/// Known Application Identifiers.
pub static AI_TABLE: &[AiSpec] = &[
    ai("00", "sscc", Fixed(18), Numeric),
    ai("01", "gtin", Fixed(14), Numeric),
    ai("02", "content_gtin", Fixed(14), Numeric),
    ai("10", "lot_number", Variable(20), Alphanumeric),
    ai("11", "production_date", Fixed(6), Date),
    ai("13", "packaging_date", Fixed(6), Date),
    ai("15", "best_before_date", Fixed(6), Date),
    ai("16", "sell_by_date", Fixed(6), Date),
    ai("17", "expiry_date", Fixed(6), Date),
    ai("20", "variant", Fixed(2), Numeric),
    ai("21", "serial_number", Variable(20), Alphanumeric),
    ai("22", "consumer_product_variant", Variable(20), Alphanumeric),
    ai("240", "additional_product_id", Variable(30), Alphanumeric),
    ai("241", "customer_part_number", Variable(30), Alphanumeric),
    ai("250", "secondary_serial", Variable(30), Alphanumeric),
    ai("30", "count", Variable(8), Numeric),
    ai("37", "count_of_items", Variable(8), Numeric),
    ai("400", "order_number", Variable(30), Alphanumeric),
    ai("410", "ship_to_gln", Fixed(13), Numeric),
    ai("414", "location_gln", Fixed(13), Numeric),
    ai("422", "origin_country", Fixed(3), Numeric),
    ai("3100", "net_weight_kg", Fixed(6), Decimal(0)),
    ai("3101", "net_weight_kg", Fixed(6), Decimal(1)),
    ai("3102", "net_weight_kg", Fixed(6), Decimal(2)),
    ai("3103", "net_weight_kg", Fixed(6), Decimal(3)),
    ai("3104", "net_weight_kg", Fixed(6), Decimal(4)),
    ai("3105", "net_weight_kg", Fixed(6), Decimal(5)),
    ai("7003", "expiry_date_time", Fixed(10), Numeric),
    ai("8004", "giai", Variable(30), Alphanumeric),
    ai("90", "internal_90", Variable(30), Alphanumeric),
    ai("91", "internal_91", Variable(90), Alphanumeric),
    ai("92", "internal_92", Variable(90), Alphanumeric),
    ai("93", "internal_93", Variable(90), Alphanumeric),
    ai("94", "internal_94", Variable(90), Alphanumeric),
    ai("95", "internal_95", Variable(90), Alphanumeric),
    ai("96", "internal_96", Variable(90), Alphanumeric),
    ai("97", "internal_97", Variable(90), Alphanumeric),
    ai("98", "internal_98", Variable(90), Alphanumeric),
    ai("99", "internal_99", Variable(90), Alphanumeric),
];

/// Look up an AI by its exact code.
pub fn lookup(code: &str) -> Option<&'static AiSpec> {
    AI_TABLE.iter().find(|spec| spec.code == code)
}

/// Longest known AI at the start of `input` (4, then 3, then 2 characters).
pub fn match_prefix(input: &[char]) -> Option<&'static AiSpec> {
    for width in [4, 3, 2] {
        if input.len() < width {
            continue;
        }
        let prefix = &input[..width];
        if !prefix.iter().all(char::is_ascii_digit) {
            continue;
        }
        let code: String = prefix.iter().collect();
        if let Some(spec) = lookup(&code) {
            return Some(spec);
        }
    }
    None
}
