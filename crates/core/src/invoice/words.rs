//! Ukrainian amount-in-words for invoice footers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const ONES_FEMININE: [&str; 10] =
    ["", "одна", "дві", "три", "чотири", "п'ять", "шість", "сім", "вісім", "дев'ять"];
const ONES_MASCULINE: [&str; 10] =
    ["", "один", "два", "три", "чотири", "п'ять", "шість", "сім", "вісім", "дев'ять"];
const TEENS: [&str; 10] = [
    "десять",
    "одинадцять",
    "дванадцять",
    "тринадцять",
    "чотирнадцять",
    "п'ятнадцять",
    "шістнадцять",
    "сімнадцять",
    "вісімнадцять",
    "дев'ятнадцять",
];
const TENS: [&str; 10] = [
    "",
    "",
    "двадцять",
    "тридцять",
    "сорок",
    "п'ятдесят",
    "шістдесят",
    "сімдесят",
    "вісімдесят",
    "дев'яносто",
];
const HUNDREDS: [&str; 10] = [
    "",
    "сто",
    "двісті",
    "триста",
    "чотириста",
    "п'ятсот",
    "шістсот",
    "сімсот",
    "вісімсот",
    "дев'ятсот",
];

const HRYVNIA: [&str; 3] = ["гривня", "гривні", "гривень"];
const KOPIYKA: [&str; 3] = ["копійка", "копійки", "копійок"];

#[derive(Clone, Copy)]
enum Gender {
    Feminine,
    Masculine,
}

struct Scale {
    divisor: u64,
    forms: [&'static str; 3],
    gender: Gender,
}

const SCALES: [Scale; 3] = [
    Scale {
        divisor: 1_000_000_000,
        forms: ["мільярд", "мільярди", "мільярдів"],
        gender: Gender::Masculine,
    },
    Scale {
        divisor: 1_000_000,
        forms: ["мільйон", "мільйони", "мільйонів"],
        gender: Gender::Masculine,
    },
    Scale { divisor: 1_000, forms: ["тисяча", "тисячі", "тисяч"], gender: Gender::Feminine },
];

const WORDS_LIMIT: u64 = 1_000_000_000_000;

/// Spells out a hryvnia amount, e.g. `2400.5` becomes
/// "Дві тисячі чотириста гривень 50 копійок". Kopiykas stay numeric.
/// Amounts of a trillion and above keep the whole part in digits.
pub fn amount_in_words(amount: Decimal) -> String {
    let rounded = amount.abs().round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let whole = rounded.trunc();
    let kopiykas = ((rounded - whole) * Decimal::ONE_HUNDRED).to_u64().unwrap_or(0);

    let mut words = match whole.to_u64() {
        Some(0) => format!("нуль {}", HRYVNIA[2]),
        Some(hryvnias) if hryvnias < WORDS_LIMIT => {
            format!("{} {}", spell_hryvnias(hryvnias), plural(hryvnias, HRYVNIA))
        }
        _ => format!("{} {}", whole, HRYVNIA[2]),
    };
    words.push_str(&format!(" {:02} {}", kopiykas, plural(kopiykas, KOPIYKA)));

    if amount < Decimal::ZERO {
        words.insert_str(0, "мінус ");
    }
    capitalize(&words)
}

fn spell_hryvnias(value: u64) -> String {
    let mut parts: Vec<&'static str> = Vec::new();
    let mut rest = value;
    for scale in &SCALES {
        let group = rest / scale.divisor;
        rest %= scale.divisor;
        if group > 0 {
            push_triad(group, scale.gender, &mut parts);
            parts.push(plural(group, scale.forms));
        }
    }
    push_triad(rest, Gender::Feminine, &mut parts);
    parts.join(" ")
}

fn push_triad(value: u64, gender: Gender, parts: &mut Vec<&'static str>) {
    let hundreds = (value / 100) as usize;
    let tail = (value % 100) as usize;

    if hundreds > 0 {
        parts.push(HUNDREDS[hundreds]);
    }
    if (10..20).contains(&tail) {
        parts.push(TEENS[tail - 10]);
        return;
    }
    if tail >= 20 {
        parts.push(TENS[tail / 10]);
    }
    let ones = tail % 10;
    if ones > 0 {
        let table = match gender {
            Gender::Feminine => &ONES_FEMININE,
            Gender::Masculine => &ONES_MASCULINE,
        };
        parts.push(table[ones]);
    }
}

fn plural(value: u64, forms: [&'static str; 3]) -> &'static str {
    let last_two = value % 100;
    let last = value % 10;
    if (11..=19).contains(&last_two) {
        forms[2]
    } else if last == 1 {
        forms[0]
    } else if (2..=4).contains(&last) {
        forms[1]
    } else {
        forms[2]
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
