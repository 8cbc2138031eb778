use regex::Regex;
use serde_json::Value;

#[inline]
pub fn capture_group_1<'a>(re: &Regex, input: &'a str) -> Option<&'a str> {
    re.captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[inline]
pub fn capture_group_1_owned(re: &Regex, input: &str) -> Option<String> {
    capture_group_1(re, input).map(ToOwned::to_owned)
}

/// Text of a YouTube renderer field that is either `{"simpleText": ".."}`
/// or `{"runs": [{"text": ".."}, ..]}`.
pub fn renderer_text(v: &Value) -> Option<&str> {
    v.get("simpleText")
        .and_then(Value::as_str)
        .or_else(|| first_run_text(v))
}

#[inline]
pub fn first_run_text(v: &Value) -> Option<&str> {
    v.get("runs")?.get(0)?.get("text")?.as_str()
}

/// Parse a magnitude string using the K=10^3 / M=10^6 suffix convention
/// ("1.2M subscribers", "15K", "523"). Returns 0 when no digits are found.
pub fn parse_magnitude(s: &str) -> u64 {
    let multiplier = if s.contains('M') {
        1_000_000.0
    } else if s.contains('K') {
        1_000.0
    } else {
        1.0
    };

    let digits: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    digits
        .parse::<f64>()
        .map(|n| (n * multiplier) as u64)
        .unwrap_or(0)
}

/// First integer embedded in a string, ignoring thousands separators
/// ("1,234 videos" -> 1234).
pub fn leading_int(s: &str) -> Option<u64> {
    let cleaned = s.replace(',', "");
    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let digits: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Minimal HTML entity decoding for timedtext payloads. Covers the named
/// entities YouTube actually emits plus decimal numeric references.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let Some(end) = rest.find(';') else {
            out.push_str(rest);
            return out;
        };
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            "nbsp" => out.push(' '),
            _ => {
                if let Some(code) = entity.strip_prefix('#')
                    && let Ok(n) = code.parse::<u32>()
                    && let Some(c) = char::from_u32(n)
                {
                    out.push(c);
                } else {
                    // Unknown entity, keep it verbatim.
                    out.push_str(&rest[..=end]);
                }
            }
        }
        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_suffixes() {
        assert_eq!(parse_magnitude("1.2M subscribers"), 1_200_000);
        assert_eq!(parse_magnitude("15K"), 15_000);
        assert_eq!(parse_magnitude("523"), 523);
        assert_eq!(parse_magnitude("no digits"), 0);
    }

    #[test]
    fn leading_int_skips_separators() {
        assert_eq!(leading_int("1,234 videos"), Some(1234));
        assert_eq!(leading_int("videos: 56"), Some(56));
        assert_eq!(leading_int("none"), None);
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#39;quoted&#39;"), "'quoted'");
        assert_eq!(decode_entities("5 &lt; 6 &gt; 4"), "5 < 6 > 4");
        assert_eq!(decode_entities("&unknown; stays"), "&unknown; stays");
        assert_eq!(decode_entities("dangling &"), "dangling &");
    }

    #[test]
    fn renderer_text_both_shapes() {
        let simple: Value = serde_json::json!({"simpleText": "hello"});
        let runs: Value = serde_json::json!({"runs": [{"text": "world"}]});
        assert_eq!(renderer_text(&simple), Some("hello"));
        assert_eq!(renderer_text(&runs), Some("world"));
        assert_eq!(renderer_text(&Value::Null), None);
    }
}
