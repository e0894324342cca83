use serde_json::{Map, Value};

pub fn find_value<'a>(object: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| object.get(*alias))
}

pub fn parse_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn parse_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_f64_from_text(text),
        _ => None,
    }
}

/// Extracts the first number from free text such as `"240 V"`, `"5,000.5"` or `"12,3 kWh"`.
pub fn parse_f64_from_text(text: &str) -> Option<f64> {
    extract_numeric_tokens(text).into_iter().find_map(|token| {
        normalize_numeric_token(&token).and_then(|normalized| normalized.parse::<f64>().ok())
    })
}

fn extract_numeric_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for char in text.chars() {
        if char.is_ascii_digit() || char == ',' || char == '.' || char == '-' {
            current.push(char);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn normalize_numeric_token(token: &str) -> Option<String> {
    let comma_count = token.matches(',').count();
    let dot_count = token.matches('.').count();

    if comma_count > 0 && dot_count > 0 {
        let comma_index = token.rfind(',')?;
        let dot_index = token.rfind('.')?;
        if comma_index > dot_index {
            return Some(token.replace('.', "").replace(',', "."));
        }
        return Some(token.replace(',', ""));
    }

    // A lone comma followed by exactly three digits is a thousands separator.
    if comma_count == 1 {
        let (_, fraction) = token.split_once(',')?;
        if fraction.len() == 3 {
            return Some(token.replace(',', ""));
        }
        return Some(token.replace(',', "."));
    }

    if comma_count > 1 {
        return Some(token.replace(',', ""));
    }

    if dot_count > 1 {
        return Some(token.replace('.', ""));
    }

    Some(token.to_string())
}
