//! Pagination parameter inference.
//!
//! Fields are recognized purely by name. Only numeric values are touched:
//! JSON numbers inside `variables`, numeric strings in the query string.

use std::collections::BTreeMap;

use reqwest::Url;
use serde_json::{Map, Value};

use crate::error::ScraperError;
use crate::template::ApiTemplate;
use crate::types::RequestDescriptor;

const PAGE_NUMBER_FIELDS: &[&str] = &["page", "pagenumber", "pageindex", "pagenum"];
const OFFSET_FIELDS: &[&str] = &["offset", "start", "from", "startindex", "skip"];
const PAGE_SIZE_FIELDS: &[&str] = &["limit", "pagesize", "perpage", "size", "count"];

const MAX_DEPTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    PageNumber,
    Offset,
    PageSize,
}

fn classify_field(name: &str) -> Option<FieldKind> {
    let lowered = name.to_ascii_lowercase();
    if PAGE_NUMBER_FIELDS.contains(&lowered.as_str()) {
        Some(FieldKind::PageNumber)
    } else if OFFSET_FIELDS.contains(&lowered.as_str()) {
        Some(FieldKind::Offset)
    } else if PAGE_SIZE_FIELDS.contains(&lowered.as_str()) {
        Some(FieldKind::PageSize)
    } else {
        None
    }
}

/// First positive page-size value in the template's variables, then in its
/// query parameters; `fallback` when neither has one.
#[must_use]
pub fn derive_page_size(template: &ApiTemplate, fallback: usize) -> usize {
    let from_variables = template
        .variables
        .as_ref()
        .and_then(|vars| find_page_size(vars, 0));
    let from_query = || {
        template.query_params.iter().find_map(|(name, value)| {
            (classify_field(name) == Some(FieldKind::PageSize))
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
                .filter(|n| *n > 0)
        })
    };
    from_variables.or_else(from_query).unwrap_or(fallback)
}

fn find_page_size(value: &Value, depth: usize) -> Option<usize> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => map.iter().find_map(|(name, v)| {
            let direct = (classify_field(name) == Some(FieldKind::PageSize))
                .then(|| v.as_u64())
                .flatten()
                .filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok());
            direct.or_else(|| find_page_size(v, depth + 1))
        }),
        Value::Array(items) => items.iter().find_map(|v| find_page_size(v, depth + 1)),
        _ => None,
    }
}

/// What a mutation pass changed.
#[derive(Debug, Default)]
struct Mutation {
    /// A page-number or offset field was set.
    position: bool,
    /// A page-size field was set.
    size: bool,
}

struct Target {
    page: u64,
    page_size: u64,
}

impl Target {
    /// Zero-based index fields (template value 0) stay zero-based.
    fn page_value(&self, original: u64) -> u64 {
        if original == 0 {
            self.page - 1
        } else {
            self.page
        }
    }

    fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

fn mutate_variables(value: &mut Value, target: &Target, depth: usize, out: &mut Mutation) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => mutate_object(map, target, depth, out),
        Value::Array(items) => {
            for item in items {
                mutate_variables(item, target, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn mutate_object(map: &mut Map<String, Value>, target: &Target, depth: usize, out: &mut Mutation) {
    for (name, v) in map.iter_mut() {
        match (classify_field(name), v.as_u64()) {
            (Some(FieldKind::PageNumber), Some(original)) => {
                *v = Value::from(target.page_value(original));
                out.position = true;
            }
            (Some(FieldKind::Offset), Some(_)) => {
                *v = Value::from(target.offset());
                out.position = true;
            }
            (Some(FieldKind::PageSize), Some(_)) => {
                *v = Value::from(target.page_size);
                out.size = true;
            }
            _ => mutate_variables(v, target, depth + 1, out),
        }
    }
}

fn mutate_query(params: &mut BTreeMap<String, String>, target: &Target, out: &mut Mutation) {
    for (name, value) in params.iter_mut() {
        let Ok(original) = value.trim().parse::<u64>() else {
            continue;
        };
        match classify_field(name) {
            Some(FieldKind::PageNumber) => {
                *value = target.page_value(original).to_string();
                out.position = true;
            }
            Some(FieldKind::Offset) => {
                *value = target.offset().to_string();
                out.position = true;
            }
            Some(FieldKind::PageSize) => {
                *value = target.page_size.to_string();
                out.size = true;
            }
            None => {}
        }
    }
}

/// Synthesize the request for `page` (1-based) with `page_size` records.
///
/// # Errors
///
/// Returns [`ScraperError::NoPaginationField`] when `page > 1` and no
/// page-number or offset field could be set (replaying would fetch the
/// same page again), and [`ScraperError::InvalidTemplateUrl`] when the
/// template's base URL does not parse.
pub fn build_request_for_page(
    template: &ApiTemplate,
    page: u32,
    page_size: usize,
) -> Result<RequestDescriptor, ScraperError> {
    let target = Target {
        page: u64::from(page.max(1)),
        page_size: u64::try_from(page_size.max(1)).unwrap_or(u64::MAX),
    };
    let mut mutation = Mutation::default();

    let mut variables = template.variables.clone();
    if let Some(vars) = variables.as_mut() {
        mutate_variables(vars, &target, 0, &mut mutation);
    }

    let mut query_params = template.query_params.clone();
    query_params.remove("variables");
    mutate_query(&mut query_params, &target, &mut mutation);

    if page > 1 && !mutation.position {
        return Err(ScraperError::NoPaginationField { page });
    }

    if template.variables_in_query {
        if let Some(vars) = &variables {
            query_params.insert("variables".to_string(), vars.to_string());
        }
    } else if let Some(raw) = template.query_params.get("variables") {
        query_params.insert("variables".to_string(), raw.clone());
    }

    let mut url = Url::parse(&template.base_url).map_err(|e| ScraperError::InvalidTemplateUrl {
        url: template.base_url.clone(),
        reason: e.to_string(),
    })?;
    if !query_params.is_empty() {
        url.query_pairs_mut().extend_pairs(query_params.iter());
    }

    let body = template.body.clone().map(|mut body| {
        if !template.variables_in_query {
            if let (Some(vars), Some(slot)) = (&variables, operation_mut(&mut body)) {
                slot.insert("variables".to_string(), vars.clone());
            }
        }
        body.to_string()
    });

    tracing::debug!(page, page_size, size_set = mutation.size, "built replay request");
    Ok(RequestDescriptor {
        method: template.method.clone(),
        url: url.to_string(),
        body,
    })
}

/// The object holding `variables`: the body itself, or the first operation
/// of a batched body.
fn operation_mut(body: &mut Value) -> Option<&mut Map<String, Value>> {
    match body {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.first_mut().and_then(Value::as_object_mut),
        _ => None,
    }
}
