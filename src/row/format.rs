//! Per-column printf-style formatting.
//!
//! A [`FormatRule`] is parsed from a template such as `"%8.2f"` or `"[%05d]"`. The
//! conversion letter of its directive decides how the field text is coerced before
//! formatting:
//!
//! | letters             | coercion                               |
//! |---------------------|----------------------------------------|
//! | `b c d i o u X x`   | leading integer of the text            |
//! | `E e f G g`         | leading floating point number          |
//! | `I`                 | integer text grouped by thousands (`s`)|
//! | `s`                 | none                                   |
//!
//! Any failure while formatting yields [`FORMAT_ERROR`] in place of the field.

use crate::error::{ColvError, Result};
use std::fmt;

/// Rendered in place of a field that could not be formatted.
pub const FORMAT_ERROR: &str = "###";

/// Value conversion applied to a field before formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Integer,
    Float,
    /// Digits grouped with commas, then printed as a string
    Grouped,
    Text,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Directive {
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
    /// `*` width or precision; never satisfiable with a single value
    star: bool,
    conversion: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Directive(Directive),
    /// A `%` sequence with an unknown conversion letter
    Unsupported,
}

/// A printf-style template bound to a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRule {
    template: String,
    pieces: Vec<Piece>,
    coercion: Coercion,
}

impl FormatRule {
    /// Parse `template`. It must contain at least one conversion directive.
    pub fn parse(template: &str) -> Result<Self> {
        let pieces = parse_pieces(template);
        let first = pieces.iter().find_map(|piece| match piece {
            Piece::Directive(directive) => Some(directive.conversion),
            _ => None,
        });
        let conversion = first.ok_or_else(|| {
            ColvError::invalid_argument(format!("format '{template}' has no conversion directive"))
        })?;

        let coercion = match conversion {
            'b' | 'c' | 'd' | 'i' | 'o' | 'u' | 'X' | 'x' => Coercion::Integer,
            'E' | 'e' | 'f' | 'G' | 'g' => Coercion::Float,
            'I' => Coercion::Grouped,
            _ => Coercion::Text,
        };

        Ok(Self {
            template: template.to_string(),
            pieces,
            coercion,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn coercion(&self) -> Coercion {
        self.coercion
    }

    /// Format `field`, or [`FORMAT_ERROR`] when that fails.
    pub fn apply(&self, field: &str) -> String {
        self.try_apply(field)
            .unwrap_or_else(|| FORMAT_ERROR.to_string())
    }

    /// Format `field`; `None` when the template cannot be satisfied with it.
    pub fn try_apply(&self, field: &str) -> Option<String> {
        let mut out = String::new();
        let mut consumed = false;
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Unsupported => return None,
                Piece::Directive(directive) => {
                    if consumed || directive.star {
                        return None;
                    }
                    consumed = true;
                    out.push_str(&self.render(directive, field)?);
                }
            }
        }
        Some(out)
    }

    fn render(&self, directive: &Directive, field: &str) -> Option<String> {
        match self.coercion {
            Coercion::Integer => format_integer(directive, leading_integer(field)?),
            Coercion::Float => Some(format_float(directive, leading_float(field))),
            Coercion::Grouped => Some(format_text(directive, &group_thousands(field)?)),
            Coercion::Text => Some(format_text(directive, field)),
        }
    }
}

impl fmt::Display for FormatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

const CONVERSIONS: &str = "bcdEefGgiIosuXx";

fn parse_pieces(template: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(std::mem::take(&mut literal)));
        }

        let mut spec = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || " #+*.-".contains(next) {
                spec.push(next);
                chars.next();
            } else {
                break;
            }
        }
        match chars.next() {
            Some(conversion) if CONVERSIONS.contains(conversion) => {
                pieces.push(Piece::Directive(parse_directive(&spec, conversion)));
            }
            _ => pieces.push(Piece::Unsupported),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

fn parse_directive(spec: &str, conversion: char) -> Directive {
    let mut flags = Flags::default();
    let mut rest = spec;
    while let Some(c) = rest.chars().next() {
        match c {
            '-' => flags.left = true,
            '0' => flags.zero = true,
            '+' => flags.plus = true,
            ' ' => flags.space = true,
            '#' => flags.alt = true,
            _ => break,
        }
        rest = &rest[1..];
    }

    let (width_part, precision_part) = match rest.split_once('.') {
        Some((width, precision)) => (width, Some(precision)),
        None => (rest, None),
    };
    let star = spec.contains('*');
    let width = width_part.parse().ok();
    let precision = precision_part.map(|p| p.parse().unwrap_or(0));

    Directive {
        flags,
        width,
        precision,
        star,
        conversion,
    }
}

/// Leading integer of `text` after optional whitespace, 0 when there is none.
/// `None` on overflow.
fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    let mut last_was_digit = false;
    for b in digits.bytes() {
        match b {
            b'0'..=b'9' => {
                let digit = i64::from(b - b'0');
                value = value.checked_mul(10)?;
                value = if negative {
                    value.checked_sub(digit)?
                } else {
                    value.checked_add(digit)?
                };
                last_was_digit = true;
            }
            b'_' if last_was_digit => last_was_digit = false,
            _ => break,
        }
    }
    Some(value)
}

/// Leading floating point number of `text`, 0.0 when there is none.
fn leading_float(text: &str) -> f64 {
    let bytes = text.trim_start().as_bytes();
    let mut end = 0;
    let digits = |from: usize| {
        let mut i = from;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let int_end = digits(end);
    let mut mantissa_end = int_end;
    if mantissa_end < bytes.len() && bytes[mantissa_end] == b'.' {
        let frac_end = digits(mantissa_end + 1);
        if frac_end > mantissa_end + 1 || int_end > end {
            mantissa_end = frac_end;
        }
    }
    if mantissa_end == end {
        return 0.0;
    }
    end = mantissa_end;

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'-' || bytes[exp] == b'+') {
            exp += 1;
        }
        let exp_end = digits(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    std::str::from_utf8(&bytes[..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

/// `"-1234567"` becomes `"-1,234,567"`. Only plain integers are grouped.
fn group_thousands(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    grouped.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    Some(grouped)
}

fn sign_for(negative: bool, flags: Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

/// Assemble `sign + prefix + body` and pad to the directive's width.
fn pad_number(directive: &Directive, sign: &str, prefix: &str, body: &str, zero_allowed: bool) -> String {
    let len = sign.len() + prefix.len() + body.chars().count();
    let width = directive.width.unwrap_or(0);
    if len >= width {
        return format!("{sign}{prefix}{body}");
    }
    let fill = width - len;
    if directive.flags.left {
        format!("{sign}{prefix}{body}{}", " ".repeat(fill))
    } else if directive.flags.zero && zero_allowed {
        format!("{sign}{prefix}{}{body}", "0".repeat(fill))
    } else {
        format!("{}{sign}{prefix}{body}", " ".repeat(fill))
    }
}

fn format_integer(directive: &Directive, value: i64) -> Option<String> {
    if directive.conversion == 'c' {
        let c = u32::try_from(value).ok().and_then(char::from_u32)?;
        return Some(format_text(directive, &c.to_string()));
    }

    let magnitude = value.unsigned_abs();
    let flags = directive.flags;
    let (mut digits, prefix) = match directive.conversion {
        'o' => (format!("{magnitude:o}"), if flags.alt { "0" } else { "" }),
        'x' => (format!("{magnitude:x}"), if flags.alt { "0x" } else { "" }),
        'X' => (format!("{magnitude:X}"), if flags.alt { "0X" } else { "" }),
        'b' => (format!("{magnitude:b}"), if flags.alt { "0b" } else { "" }),
        _ => (magnitude.to_string(), ""),
    };
    if let Some(precision) = directive.precision {
        if digits.len() < precision {
            digits = format!("{}{digits}", "0".repeat(precision - digits.len()));
        }
    }

    let sign = sign_for(value < 0, flags);
    Some(pad_number(
        directive,
        sign,
        prefix,
        &digits,
        directive.precision.is_none(),
    ))
}

fn format_float(directive: &Directive, value: f64) -> String {
    let flags = directive.flags;
    let sign = sign_for(value.is_sign_negative() && value != 0.0, flags);
    if !value.is_finite() {
        let body = if value.is_nan() { "NaN" } else { "Inf" };
        return pad_number(directive, sign, "", body, false);
    }

    let magnitude = value.abs();
    let precision = directive.precision.unwrap_or(6);
    let upper = directive.conversion.is_ascii_uppercase();
    let mut body = match directive.conversion {
        'e' | 'E' => exponent_form(magnitude, precision),
        'g' | 'G' => general_form(magnitude, precision, flags.alt),
        _ => format!("{magnitude:.precision$}"),
    };
    if flags.alt && precision == 0 && !body.contains('.') && !matches!(directive.conversion, 'g' | 'G') {
        match body.find('e') {
            Some(at) => body.insert(at, '.'),
            None => body.push('.'),
        }
    }
    if upper {
        body = body.to_uppercase();
    }
    pad_number(directive, sign, "", &body, true)
}

/// `d.ddde±XX`, exponent at least two digits.
fn exponent_form(magnitude: f64, precision: usize) -> String {
    let raw = format!("{magnitude:.precision$e}");
    let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}

fn general_form(magnitude: f64, precision: usize, keep_zeros: bool) -> String {
    let significant = precision.max(1);
    let sci = format!("{magnitude:.prec$e}", prec = significant - 1);
    let exponent: i32 = sci
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0);

    let mut body = if exponent < -4 || exponent >= significant as i32 {
        exponent_form(magnitude, significant - 1)
    } else {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        format!("{magnitude:.decimals$}")
    };

    if !keep_zeros {
        let (mantissa, tail) = match body.find('e') {
            Some(at) => body.split_at(at),
            None => (body.as_str(), ""),
        };
        if mantissa.contains('.') {
            let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
            body = format!("{trimmed}{tail}");
        }
    }
    body
}

fn format_text(directive: &Directive, text: &str) -> String {
    let text: String = match directive.precision {
        Some(precision) => text.chars().take(precision).collect(),
        None => text.to_string(),
    };
    let width = directive.width.unwrap_or(0);
    let len = text.chars().count();
    if len >= width {
        text
    } else if directive.flags.left {
        format!("{text}{}", " ".repeat(width - len))
    } else {
        format!("{}{text}", " ".repeat(width - len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(template: &str, field: &str) -> String {
        FormatRule::parse(template).unwrap().apply(field)
    }

    #[test]
    fn coercion_follows_conversion_letter() {
        assert_eq!(FormatRule::parse("%d").unwrap().coercion(), Coercion::Integer);
        assert_eq!(FormatRule::parse("%x").unwrap().coercion(), Coercion::Integer);
        assert_eq!(FormatRule::parse("%.2f").unwrap().coercion(), Coercion::Float);
        assert_eq!(FormatRule::parse("%G").unwrap().coercion(), Coercion::Float);
        assert_eq!(FormatRule::parse("%10I").unwrap().coercion(), Coercion::Grouped);
        assert_eq!(FormatRule::parse("<%s>").unwrap().coercion(), Coercion::Text);
    }

    #[test]
    fn template_without_directive_is_rejected() {
        assert!(FormatRule::parse("plain").is_err());
        assert!(FormatRule::parse("100%%").is_err());
        assert!(FormatRule::parse("").is_err());
    }

    #[test]
    fn integer_formatting() {
        assert_eq!(fmt("%5d", "42"), "   42");
        assert_eq!(fmt("%-5d|", "42"), "42   |");
        assert_eq!(fmt("%05d", "-42"), "-0042");
        assert_eq!(fmt("%+d", "7"), "+7");
        assert_eq!(fmt("%x", "255"), "ff");
        assert_eq!(fmt("%#X", "255"), "0XFF");
        assert_eq!(fmt("%o", "8"), "10");
        assert_eq!(fmt("%b", "5"), "101");
        assert_eq!(fmt("%.3d", "7"), "007");
        assert_eq!(fmt("%c", "65"), "A");
    }

    #[test]
    fn integer_coercion_is_lenient() {
        assert_eq!(fmt("%d", "12abc"), "12");
        assert_eq!(fmt("%d", "  -3 apples"), "-3");
        assert_eq!(fmt("%d", "1_000"), "1000");
        assert_eq!(fmt("%d", "abc"), "0");
    }

    #[test]
    fn float_formatting() {
        assert_eq!(fmt("%.2f", "3.14159"), "3.14");
        assert_eq!(fmt("%8.3f", "2.5"), "   2.500");
        assert_eq!(fmt("%f", "1"), "1.000000");
        assert_eq!(fmt("%.2e", "12345"), "1.23e+04");
        assert_eq!(fmt("%E", "0.00012"), "1.200000E-04");
        assert_eq!(fmt("%g", "100000"), "100000");
        assert_eq!(fmt("%g", "1000000"), "1e+06");
        assert_eq!(fmt("%g", "0.0001"), "0.0001");
        assert_eq!(fmt("%g", "2.50"), "2.5");
        assert_eq!(fmt("%.1f", "x"), "0.0");
        assert_eq!(fmt("%.1f", "1.5e2ms"), "150.0");
    }

    #[test]
    fn grouped_integers() {
        assert_eq!(fmt("%I", "1234567"), "1,234,567");
        assert_eq!(fmt("%I", "-1234"), "-1,234");
        assert_eq!(fmt("%I", "999"), "999");
        assert_eq!(fmt("%10I", "1234567"), " 1,234,567");
        assert_eq!(fmt("%I", "12.5"), FORMAT_ERROR);
    }

    #[test]
    fn text_and_literals() {
        assert_eq!(fmt("[%s]", "abc"), "[abc]");
        assert_eq!(fmt("%-6s|", "abc"), "abc   |");
        assert_eq!(fmt("%.2s", "abc"), "ab");
        assert_eq!(fmt("%d%%", "50"), "50%");
    }

    #[test]
    fn unsatisfiable_templates_render_error_marker() {
        assert_eq!(fmt("%d %d", "1"), FORMAT_ERROR);
        assert_eq!(fmt("%*d", "1"), FORMAT_ERROR);
        assert_eq!(fmt("%d %z", "1"), FORMAT_ERROR);
        assert_eq!(fmt("%d", "99999999999999999999"), FORMAT_ERROR);
        assert_eq!(fmt("%c", "-1"), FORMAT_ERROR);
    }
}
