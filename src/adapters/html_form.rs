use std::sync::LazyLock;

use regex::Regex;

use crate::adapters::browser::BrowserError;

static ELEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(form|input|button|select|option|textarea|a)\b([^>]*)>")
        .expect("element pattern is valid")
});

static ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute pattern is valid")
});

static SELECTOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^([A-Za-z][A-Za-z0-9]*)?(?:#([-A-Za-z0-9_.:]+))?(?:\[([A-Za-z_:][-A-Za-z0-9_:.]*)(\*?=)["']?([^"'\]]*)["']?\])?$"#,
    )
    .expect("selector pattern is valid")
});

static BODY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<body\b[^>]*>(.*?)(?:</body>|$)").expect("body pattern is valid")
});

static INVISIBLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("script pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub start: usize,
    pub end: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.attr("name")
            .or_else(|| self.attr("id"))
            .filter(|name| !name.is_empty())
    }

    fn input_type(&self) -> String {
        self.attr("type").unwrap_or("text").to_ascii_lowercase()
    }

    pub fn is_submit_control(&self) -> bool {
        match self.tag.as_str() {
            "button" => self.input_type() == "submit" || self.attr("type").is_none(),
            "input" => matches!(self.input_type().as_str(), "submit" | "image"),
            _ => false,
        }
    }
}

pub fn elements(html: &str) -> Vec<Element> {
    ELEMENT_PATTERN
        .captures_iter(html)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let tag = captures.get(1)?.as_str().to_ascii_lowercase();
            let attrs = captures
                .get(2)
                .map(|raw| parse_attributes(raw.as_str()))
                .unwrap_or_default();
            Some(Element {
                tag,
                attrs,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTRIBUTE_PATTERN
        .captures_iter(raw.trim_end_matches('/'))
        .filter_map(|captures| {
            let name = captures.get(1)?.as_str().to_ascii_lowercase();
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map(|value| decode_entities(value.as_str()))
                .unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

pub fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[derive(Debug, Clone, PartialEq)]
enum AttrMatch {
    Equals(String, String),
    Contains(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    attr: Option<AttrMatch>,
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self, BrowserError> {
        let unsupported = || BrowserError::UnsupportedSelector(selector.to_string());
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(unsupported());
        }

        let captures = SELECTOR_PATTERN.captures(trimmed).ok_or_else(unsupported)?;
        let tag = captures.get(1).map(|tag| tag.as_str().to_ascii_lowercase());
        let id = captures.get(2).map(|id| id.as_str().to_string());
        let attr = match (captures.get(3), captures.get(4), captures.get(5)) {
            (Some(name), Some(operator), value) => {
                let name = name.as_str().to_ascii_lowercase();
                let value = value.map(|value| value.as_str().to_string()).unwrap_or_default();
                Some(if operator.as_str() == "*=" {
                    AttrMatch::Contains(name, value)
                } else {
                    AttrMatch::Equals(name, value)
                })
            }
            _ => None,
        };

        if tag.is_none() && id.is_none() && attr.is_none() {
            return Err(unsupported());
        }

        Ok(Self { tag, id, attr })
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag
            && tag != &element.tag
        {
            return false;
        }

        if let Some(id) = &self.id
            && element.attr("id") != Some(id.as_str())
        {
            return false;
        }

        match &self.attr {
            Some(AttrMatch::Equals(name, value)) => element
                .attr(name)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(value)),
            Some(AttrMatch::Contains(name, value)) => {
                element.attr(name).is_some_and(|actual| actual.contains(value.as_str()))
            }
            None => true,
        }
    }
}

pub fn find<'a>(elements: &'a [Element], selector: &Selector) -> Option<&'a Element> {
    elements.iter().find(|element| selector.matches(element))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub action: Option<String>,
    pub method: FormMethod,
    pub fields: Vec<(String, String)>,
}

impl Form {
    pub fn apply(&mut self, typed: &[(String, String)]) {
        for (name, value) in typed {
            match self.fields.iter_mut().find(|(field, _)| field == name) {
                Some(field) => field.1 = value.clone(),
                None => self.fields.push((name.clone(), value.clone())),
            }
        }
    }
}

pub fn enclosing_form(html: &str, elements: &[Element], control: &Element) -> Option<Form> {
    let lowered = html.to_ascii_lowercase();
    let form = elements
        .iter()
        .filter(|element| element.tag == "form" && element.start < control.start)
        .filter(|form| form_end(&lowered, form) > control.start)
        .last()?;
    let end = form_end(&lowered, form);

    let method = match form.attr("method").map(str::to_ascii_lowercase).as_deref() {
        Some("post") => FormMethod::Post,
        _ => FormMethod::Get,
    };

    let mut fields = Vec::new();
    let inside = elements
        .iter()
        .filter(|element| element.start > form.start && element.start < end);

    for element in inside {
        let Some(name) = element.attr("name").filter(|name| !name.is_empty()) else {
            continue;
        };
        if element.has_attr("disabled") {
            continue;
        }

        match element.tag.as_str() {
            "input" => {
                let input_type = element.input_type();
                let checkable = matches!(input_type.as_str(), "checkbox" | "radio");
                if matches!(
                    input_type.as_str(),
                    "submit" | "image" | "button" | "reset" | "file"
                ) || (checkable && !element.has_attr("checked"))
                {
                    continue;
                }
                let default_value = if checkable { "on" } else { "" };
                fields.push((
                    name.to_string(),
                    element.attr("value").unwrap_or(default_value).to_string(),
                ));
            }
            "select" => {
                if let Some(value) = selected_option(html, &lowered, elements, element) {
                    fields.push((name.to_string(), value));
                }
            }
            "textarea" => {
                let content_end = lowered[element.end..]
                    .find("</textarea")
                    .map(|offset| element.end + offset)
                    .unwrap_or(element.end);
                fields.push((
                    name.to_string(),
                    decode_entities(&html[element.end..content_end]),
                ));
            }
            _ => {}
        }
    }

    if control.is_submit_control()
        && let Some(name) = control.attr("name").filter(|name| !name.is_empty())
    {
        fields.push((
            name.to_string(),
            control.attr("value").unwrap_or_default().to_string(),
        ));
    }

    Some(Form {
        action: form
            .attr("action")
            .filter(|action| !action.trim().is_empty())
            .map(str::to_string),
        method,
        fields,
    })
}

fn form_end(lowered: &str, form: &Element) -> usize {
    lowered[form.end..]
        .find("</form")
        .map(|offset| form.end + offset)
        .unwrap_or(lowered.len())
}

fn selected_option(
    html: &str,
    lowered: &str,
    elements: &[Element],
    select: &Element,
) -> Option<String> {
    let end = lowered[select.end..]
        .find("</select")
        .map(|offset| select.end + offset)
        .unwrap_or(lowered.len());
    let options: Vec<&Element> = elements
        .iter()
        .filter(|element| {
            element.tag == "option" && element.start > select.start && element.start < end
        })
        .collect();
    let chosen = options
        .iter()
        .find(|option| option.has_attr("selected"))
        .or_else(|| options.first())?;

    match chosen.attr("value") {
        Some(value) => Some(value.to_string()),
        None => {
            let text_end = lowered[chosen.end..]
                .find('<')
                .map(|offset| chosen.end + offset)
                .unwrap_or(end);
            Some(decode_entities(html[chosen.end..text_end].trim()))
        }
    }
}

pub fn inner_text(html: &str) -> String {
    let without_scripts = INVISIBLE_PATTERN.replace_all(html, " ");
    let body = BODY_PATTERN
        .captures(&without_scripts)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().to_string())
        .unwrap_or_else(|| without_scripts.to_string());

    let mut out = String::with_capacity(body.len());
    let mut in_tag = false;
    for ch in body.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    decode_entities(&out.split_whitespace().collect::<Vec<_>>().join(" "))
}
