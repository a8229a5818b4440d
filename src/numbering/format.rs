//! Number styles and counter formatting

/// Number format (w:numFmt)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NumberFormat {
    /// 1, 2, 3
    Decimal,
    /// I, II, III
    UpperRoman,
    /// i, ii, iii
    LowerRoman,
    /// A, B, C
    UpperLetter,
    /// a, b, c
    LowerLetter,
    /// 1st, 2nd, 3rd
    Ordinal,
    /// First, Second, Third
    OrdinalText,
    /// One, Two, Three
    CardinalText,
    /// 1, 2, ..., A, B (hexadecimal)
    Hex,
    /// •
    Bullet,
    /// 一, 二, 三 (chineseCounting)
    ChineseCounting,
    /// 一, 二, 三 (chineseCountingThousand)
    ChineseCountingThousand,
    /// 壹, 贰, 叁 (ideographLegalTraditional)
    ChineseLegalTraditional,
    /// 甲, 乙, 丙 (ideographTraditional)
    IdeographTraditional,
    /// ㈠, ㈡, ㈢ (ideographEnclosedCircle)
    IdeographEnclosedCircle,
    /// 01, 02, 03 (decimalZero)
    DecimalZero,
    /// 一, 二, 三 (taiwaneseCounting)
    TaiwaneseCounting,
    /// None (no number)
    None,
    /// Other format (preserved as string, rendered as decimal)
    Other(String),
}

impl NumberFormat {
    /// Parse the `w:numFmt` value
    pub fn from_name(s: &str) -> Self {
        match s {
            "decimal" => NumberFormat::Decimal,
            "upperRoman" => NumberFormat::UpperRoman,
            "lowerRoman" => NumberFormat::LowerRoman,
            "upperLetter" => NumberFormat::UpperLetter,
            "lowerLetter" => NumberFormat::LowerLetter,
            "ordinal" => NumberFormat::Ordinal,
            "ordinalText" => NumberFormat::OrdinalText,
            "cardinalText" => NumberFormat::CardinalText,
            "hex" => NumberFormat::Hex,
            "bullet" => NumberFormat::Bullet,
            "chineseCounting" => NumberFormat::ChineseCounting,
            "chineseCountingThousand" => NumberFormat::ChineseCountingThousand,
            "ideographLegalTraditional" => NumberFormat::ChineseLegalTraditional,
            "ideographTraditional" => NumberFormat::IdeographTraditional,
            "ideographEnclosedCircle" => NumberFormat::IdeographEnclosedCircle,
            "decimalZero" => NumberFormat::DecimalZero,
            "taiwaneseCounting" => NumberFormat::TaiwaneseCounting,
            "none" => NumberFormat::None,
            other => NumberFormat::Other(other.to_string()),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &str {
        match self {
            NumberFormat::Decimal => "decimal",
            NumberFormat::UpperRoman => "upperRoman",
            NumberFormat::LowerRoman => "lowerRoman",
            NumberFormat::UpperLetter => "upperLetter",
            NumberFormat::LowerLetter => "lowerLetter",
            NumberFormat::Ordinal => "ordinal",
            NumberFormat::OrdinalText => "ordinalText",
            NumberFormat::CardinalText => "cardinalText",
            NumberFormat::Hex => "hex",
            NumberFormat::Bullet => "bullet",
            NumberFormat::ChineseCounting => "chineseCounting",
            NumberFormat::ChineseCountingThousand => "chineseCountingThousand",
            NumberFormat::ChineseLegalTraditional => "ideographLegalTraditional",
            NumberFormat::IdeographTraditional => "ideographTraditional",
            NumberFormat::IdeographEnclosedCircle => "ideographEnclosedCircle",
            NumberFormat::DecimalZero => "decimalZero",
            NumberFormat::TaiwaneseCounting => "taiwaneseCounting",
            NumberFormat::None => "none",
            NumberFormat::Other(s) => s,
        }
    }

    /// Check if this is a bullet format
    pub fn is_bullet(&self) -> bool {
        matches!(self, NumberFormat::Bullet)
    }

    /// Check if this is a numbered format (not bullet)
    pub fn is_numbered(&self) -> bool {
        !matches!(self, NumberFormat::Bullet | NumberFormat::None)
    }

    /// Render a counter value in this style
    pub fn format(&self, n: u32) -> String {
        match self {
            NumberFormat::Decimal | NumberFormat::Other(_) => n.to_string(),
            NumberFormat::DecimalZero => {
                if n < 10 {
                    format!("0{}", n)
                } else {
                    n.to_string()
                }
            }
            NumberFormat::UpperRoman => roman(n),
            NumberFormat::LowerRoman => roman(n).to_lowercase(),
            NumberFormat::UpperLetter => letter(n),
            NumberFormat::LowerLetter => letter(n).to_lowercase(),
            NumberFormat::Ordinal => ordinal(n),
            NumberFormat::OrdinalText => ordinal_text(n),
            NumberFormat::CardinalText => capitalize(&cardinal_text(n)),
            NumberFormat::Hex => format!("{:X}", n),
            NumberFormat::Bullet | NumberFormat::None => String::new(),
            NumberFormat::ChineseCounting => chinese_counting(n),
            NumberFormat::ChineseCountingThousand | NumberFormat::TaiwaneseCounting => {
                chinese_positional(n, &CHINESE_DIGITS, &CHINESE_UNITS, true)
            }
            NumberFormat::ChineseLegalTraditional => {
                chinese_positional(n, &LEGAL_DIGITS, &LEGAL_UNITS, false)
            }
            NumberFormat::IdeographTraditional => {
                if n == 0 {
                    n.to_string()
                } else {
                    HEAVENLY_STEMS[((n - 1) % 10) as usize].to_string()
                }
            }
            NumberFormat::IdeographEnclosedCircle => match n {
                1..=10 => ENCLOSED[(n - 1) as usize].to_string(),
                _ => n.to_string(),
            },
        }
    }
}

impl std::str::FromStr for NumberFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(NumberFormat::from_name(s))
    }
}

const CHINESE_DIGITS: [char; 10] = ['〇', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const CHINESE_UNITS: [char; 4] = ['\0', '十', '百', '千'];
const LEGAL_DIGITS: [char; 10] = ['零', '壹', '贰', '叁', '肆', '伍', '陆', '柒', '捌', '玖'];
const LEGAL_UNITS: [char; 4] = ['\0', '拾', '佰', '仟'];
const HEAVENLY_STEMS: [char; 10] = ['甲', '乙', '丙', '丁', '戊', '己', '庚', '辛', '壬', '癸'];
const ENCLOSED: [char; 10] = ['㈠', '㈡', '㈢', '㈣', '㈤', '㈥', '㈦', '㈧', '㈨', '㈩'];

fn roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if n == 0 {
        return "0".to_string();
    }
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

/// A..Z, then AA..ZZ, AAA.. (Word repeats the letter)
fn letter(n: u32) -> String {
    if n == 0 {
        return String::new();
    }
    let index = (n - 1) % 26;
    let repeat = (n - 1) / 26 + 1;
    let c = (b'A' + index as u8) as char;
    std::iter::repeat(c).take(repeat as usize).collect()
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

fn cardinal_text(n: u32) -> String {
    match n {
        0..=19 => ONES[n as usize].to_string(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                r => format!("{}-{}", tens, ONES[r as usize]),
            }
        }
        100..=999 => {
            let head = format!("{} hundred", ONES[(n / 100) as usize]);
            match n % 100 {
                0 => head,
                r => format!("{} {}", head, cardinal_text(r)),
            }
        }
        1000..=999_999 => {
            let head = format!("{} thousand", cardinal_text(n / 1000));
            match n % 1000 {
                0 => head,
                r => format!("{} {}", head, cardinal_text(r)),
            }
        }
        _ => {
            let head = format!("{} million", cardinal_text(n / 1_000_000));
            match n % 1_000_000 {
                0 => head,
                r => format!("{} {}", head, cardinal_text(r)),
            }
        }
    }
}

fn ordinal_text(n: u32) -> String {
    let cardinal = cardinal_text(n);
    // Only the last word takes the ordinal form
    let split = cardinal.rfind([' ', '-']).map(|i| i + 1).unwrap_or(0);
    let (head, last) = cardinal.split_at(split);
    let last = match last {
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{}th", w),
    };
    capitalize(&format!("{}{}", head, last))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// chineseCounting: positional below 100, digit by digit above
fn chinese_counting(n: u32) -> String {
    match n {
        0..=9 => CHINESE_DIGITS[n as usize].to_string(),
        10..=99 => chinese_positional(n, &CHINESE_DIGITS, &CHINESE_UNITS, true),
        _ => n
            .to_string()
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| CHINESE_DIGITS[d as usize])
            .collect(),
    }
}

/// Positional reading with 十/百/千 and 万 groups; runs of zeros read as one 零
fn chinese_positional(n: u32, digits: &[char; 10], units: &[char; 4], short_ten: bool) -> String {
    if n == 0 {
        return digits[0].to_string();
    }
    let zero = if digits[0] == '〇' { '零' } else { digits[0] };
    let group = |g: u32| -> String {
        let mut out = String::new();
        let mut pending_zero = false;
        for pos in (0..4).rev() {
            let d = (g / 10u32.pow(pos)) % 10;
            if d == 0 {
                if !out.is_empty() {
                    pending_zero = true;
                }
                continue;
            }
            if pending_zero {
                out.push(zero);
                pending_zero = false;
            }
            out.push(digits[d as usize]);
            if pos > 0 {
                out.push(units[pos as usize]);
            }
        }
        out
    };

    let mut out = String::new();
    let high = n / 10_000;
    let low = n % 10_000;
    if high > 0 {
        out.push_str(&chinese_positional(high, digits, units, short_ten));
        out.push('万');
        if low > 0 && low < 1000 {
            out.push(zero);
        }
    }
    if low > 0 {
        out.push_str(&group(low));
    }
    if short_ten && (10..20).contains(&n) {
        // 十一 rather than 一十一
        out.remove(0);
    }
    out
}
