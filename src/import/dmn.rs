//! DMN XML parser
//!
//! Reads OMG DMN 1.1 / 1.2 / 1.3 interchange XML into the internal
//! decision model. The parser is namespace-prefix agnostic: it locates the
//! `definitions` root by local name and never fails hard on syntactic
//! problems, which are collected into the result's error list instead.

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde_json::{Number, Value};

use super::ImportError;
use crate::models::{
    Aggregation, Condition, Decision, DecisionInput, DecisionOutput, HitPolicy, Rule, RuleOutput,
};

/// DMN interchange format version, detected from the model namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DmnVersion {
    V1_1,
    V1_2,
    #[default]
    V1_3,
}

impl DmnVersion {
    /// The OMG model namespace for this version
    pub fn namespace(&self) -> &'static str {
        match self {
            DmnVersion::V1_1 => "http://www.omg.org/spec/DMN/20151101/dmn.xsd",
            DmnVersion::V1_2 => "https://www.omg.org/spec/DMN/20180521/MODEL/",
            DmnVersion::V1_3 => "https://www.omg.org/spec/DMN/20191111/MODEL/",
        }
    }
}

/// Result of a parse: the recovered definitions plus collected diagnostics
#[derive(Debug, Default)]
pub struct DmnParseResult {
    /// Parsed definitions; absent when the document is unusable
    pub definitions: Option<DmnDefinitions>,
    /// Fatal problems (syntax, missing `definitions` root)
    pub errors: Vec<String>,
    /// Recoverable oddities (unknown hit policy, unknown namespace, ...)
    pub warnings: Vec<String>,
}

impl DmnParseResult {
    /// Whether the parse produced usable definitions without errors
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.definitions.is_some()
    }
}

/// Outcome of [`DmnParser::validate`]
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Parsed `definitions` root
#[derive(Debug, Clone)]
pub struct DmnDefinitions {
    pub id: String,
    pub name: String,
    pub namespace: Option<String>,
    pub version: DmnVersion,
    pub decisions: Vec<ParsedDecision>,
}

/// One `decision` element
#[derive(Debug, Clone)]
pub struct ParsedDecision {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Referenced decisions (information requirements)
    pub required_decisions: Vec<String>,
    /// Referenced knowledge authorities
    pub required_authorities: Vec<String>,
    pub table: Option<ParsedTable>,
}

/// One `decisionTable` element
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub hit_policy: HitPolicy,
    pub aggregation: Option<Aggregation>,
    pub inputs: Vec<DecisionInput>,
    pub outputs: Vec<DecisionOutput>,
    pub rules: Vec<Rule>,
}

/// DMN XML parser
#[derive(Debug, Default)]
pub struct DmnParser;

impl DmnParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse DMN XML.
    ///
    /// Syntactic failures and a missing `definitions` root are returned in
    /// `errors`; this method never panics and never returns `Err`.
    pub fn parse(&self, xml: &str) -> DmnParseResult {
        let mut result = DmnParseResult::default();
        let root = match parse_tree(xml) {
            Ok(root) => root,
            Err(message) => {
                result.errors.push(message);
                return result;
            }
        };
        let Some(definitions) = find_element(&root, "definitions") else {
            result
                .errors
                .push("no 'definitions' element found in document".to_string());
            return result;
        };

        let version = detect_version(definitions, &mut result.warnings);
        let mut decisions = Vec::new();
        for element in definitions.children_named("decision") {
            decisions.push(self.parse_decision(element, &mut result.warnings));
        }
        if decisions.is_empty() {
            result
                .warnings
                .push("definitions contain no decision elements".to_string());
        }

        result.definitions = Some(DmnDefinitions {
            id: definitions.attr("id").unwrap_or_default(),
            name: definitions.attr("name").unwrap_or_default(),
            namespace: definitions.attr("namespace"),
            version,
            decisions,
        });
        result
    }

    /// Check DMN XML without converting it
    pub fn validate(&self, xml: &str) -> ValidationOutcome {
        let parsed = self.parse(xml);
        let mut errors = parsed.errors;
        if let Some(definitions) = &parsed.definitions {
            for decision in &definitions.decisions {
                if decision.id.is_empty() {
                    errors.push("decision element without an id".to_string());
                }
                if let Some(table) = &decision.table {
                    if table.inputs.is_empty() {
                        errors.push(format!("decision '{}' has no inputs", decision.id));
                    }
                    if table.outputs.is_empty() {
                        errors.push(format!("decision '{}' has no outputs", decision.id));
                    }
                }
            }
        }
        ValidationOutcome {
            valid: errors.is_empty(),
            errors,
            warnings: parsed.warnings,
        }
    }

    fn parse_decision(&self, element: &XmlElement, warnings: &mut Vec<String>) -> ParsedDecision {
        let id = element.attr("id").unwrap_or_default();
        let required_decisions = element
            .children_named("informationRequirement")
            .flat_map(|req| req.children_named("requiredDecision"))
            .filter_map(|r| r.attr("href"))
            .map(|href| href.trim_start_matches('#').to_string())
            .collect();
        let required_authorities = element
            .children_named("authorityRequirement")
            .flat_map(|req| req.children_named("requiredAuthority"))
            .filter_map(|r| r.attr("href"))
            .map(|href| href.trim_start_matches('#').to_string())
            .collect();

        let table = element
            .child("decisionTable")
            .map(|table| self.parse_table(&id, table, warnings));

        ParsedDecision {
            name: element.attr("name").unwrap_or_else(|| id.clone()),
            id,
            description: element.child("description").map(|d| d.text.trim().to_string()),
            required_decisions,
            required_authorities,
            table,
        }
    }

    fn parse_table(
        &self,
        decision_id: &str,
        element: &XmlElement,
        warnings: &mut Vec<String>,
    ) -> ParsedTable {
        let hit_policy = match element.attr("hitPolicy") {
            Some(raw) => HitPolicy::from_dmn(&raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "decision '{}': unknown hit policy '{}', assuming FIRST",
                    decision_id, raw
                ));
                HitPolicy::First
            }),
            // the DMN default is UNIQUE
            None => HitPolicy::Unique,
        };
        let aggregation = element.attr("aggregation").and_then(|raw| {
            if raw.trim().is_empty() {
                return None;
            }
            let parsed = Aggregation::from_dmn(&raw);
            if parsed.is_none() {
                warnings.push(format!(
                    "decision '{}': unknown aggregation '{}', ignoring",
                    decision_id, raw
                ));
            }
            parsed
        });

        let inputs: Vec<DecisionInput> = element
            .children_named("input")
            .enumerate()
            .map(|(index, input)| self.parse_input(index, input))
            .collect();
        let outputs: Vec<DecisionOutput> = element
            .children_named("output")
            .enumerate()
            .map(|(index, output)| self.parse_output(index, output))
            .collect();
        let rules = element
            .children_named("rule")
            .enumerate()
            .map(|(index, rule)| self.parse_rule(index, rule, &inputs, &outputs))
            .collect();

        ParsedTable {
            hit_policy,
            aggregation,
            inputs,
            outputs,
            rules,
        }
    }

    fn parse_input(&self, index: usize, element: &XmlElement) -> DecisionInput {
        let id = element
            .attr("id")
            .unwrap_or_else(|| format!("input_{}", index));
        let expression_element = element.child("inputExpression");
        let expression = expression_element
            .and_then(|e| e.child("text"))
            .map(|t| t.text.trim().to_string())
            .unwrap_or_default();
        let type_ref = expression_element.and_then(|e| e.attr("typeRef"));
        let label = element.attr("label").unwrap_or_else(|| id.clone());
        let mut input = DecisionInput::new(id, label, expression);
        input.type_ref = type_ref;
        input
    }

    fn parse_output(&self, index: usize, element: &XmlElement) -> DecisionOutput {
        let id = element
            .attr("id")
            .unwrap_or_else(|| format!("output_{}", index));
        let name = element.attr("name").unwrap_or_else(|| id.clone());
        let label = element.attr("label").unwrap_or_else(|| name.clone());
        let type_ref = element.attr("typeRef");
        let output_values = element
            .child("outputValues")
            .and_then(|values| values.child("text"))
            .map(|t| {
                split_literal_list(&t.text)
                    .iter()
                    .map(|item| parse_value(item, type_ref.as_deref()))
                    .collect()
            })
            .unwrap_or_default();
        let mut output = DecisionOutput::new(id, label, name);
        output.type_ref = type_ref;
        output.output_values = output_values;
        output
    }

    fn parse_rule(
        &self,
        index: usize,
        element: &XmlElement,
        inputs: &[DecisionInput],
        outputs: &[DecisionOutput],
    ) -> Rule {
        let id = element
            .attr("id")
            .unwrap_or_else(|| format!("rule_{}", index));
        let mut rule = Rule::new(id);
        rule.description = element
            .child("description")
            .map(|d| d.text.trim().to_string())
            .filter(|d| !d.is_empty());

        for (column, entry) in element.children_named("inputEntry").enumerate() {
            let Some(input) = inputs.get(column) else {
                continue;
            };
            let text = entry
                .child("text")
                .map(|t| t.text.trim().to_string())
                .unwrap_or_default();
            // "-" is the DMN don't-care entry
            if text.is_empty() || text == "-" {
                continue;
            }
            let (operator, value) = parse_condition_text(&text, input.type_ref.as_deref());
            rule.conditions.push(Condition::new(&input.id, operator, value));
        }

        for (column, entry) in element.children_named("outputEntry").enumerate() {
            let Some(output) = outputs.get(column) else {
                continue;
            };
            let text = entry
                .child("text")
                .map(|t| t.text.trim().to_string())
                .unwrap_or_default();
            let value = parse_value(&text, output.type_ref.as_deref());
            rule.outputs.push(RuleOutput::new(&output.id, value));
        }
        rule
    }
}

/// Convert DMN XML into storable Draft decisions (version 1).
///
/// The XML decision id becomes the logical `decision_key`; the stored id
/// is derived deterministically from key and version.
pub fn convert_to_decisions(
    xml: &str,
    tenant_id: Option<&str>,
) -> Result<Vec<Decision>, ImportError> {
    let parsed = DmnParser::new().parse(xml);
    if let Some(first_error) = parsed.errors.first() {
        return Err(ImportError::DmnParseError(first_error.clone()));
    }
    let Some(definitions) = parsed.definitions else {
        return Err(ImportError::DmnParseError(
            "document contains no definitions".to_string(),
        ));
    };

    let mut decisions = Vec::new();
    for parsed_decision in definitions.decisions {
        let Some(table) = parsed_decision.table else {
            continue;
        };
        let key = parsed_decision.id.clone();
        let mut decision = Decision::new(
            Decision::generate_id(&key, 1),
            key,
            parsed_decision.name.clone(),
            chrono::Utc::now(),
        )
        .with_hit_policy(table.hit_policy);
        decision.description = parsed_decision.description.clone();
        decision.aggregation = table.aggregation;
        decision.inputs = table.inputs;
        decision.outputs = table.outputs;
        decision.rules = table.rules;
        decision.touch_rule_count();
        decision.tenant_id = tenant_id.map(|t| t.to_string());
        decisions.push(decision);
    }
    if decisions.is_empty() {
        return Err(ImportError::DmnValidationError(
            "document contains no decision tables".to_string(),
        ));
    }
    Ok(decisions)
}

// ---- generic XML tree ----

/// Minimal namespace-agnostic XML element tree
#[derive(Debug, Clone, Default)]
struct XmlElement {
    /// Local element name (namespace prefix stripped)
    name: String,
    /// Attributes as (local name, value); prefixed names keep a second
    /// entry under their full name for namespace sniffing
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn attr(&self, local_name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(name, _)| name == local_name)
            .map(|(_, value)| value.clone())
    }

    fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == local_name)
    }

    fn children_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == local_name)
    }
}

fn local_name(qualified: &[u8]) -> String {
    let text = String::from_utf8_lossy(qualified);
    match text.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => text.into_owned(),
    }
}

/// Parse a document into an element tree rooted at a synthetic wrapper
fn parse_tree(xml: &str) -> Result<XmlElement, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = vec![XmlElement {
        name: "#document".to_string(),
        ..Default::default()
    }];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(element_from_start(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from_start(&start)?;
                stack
                    .last_mut()
                    .expect("document root always present")
                    .children
                    .push(element);
            }
            Ok(Event::End(_)) => {
                if stack.len() <= 1 {
                    return Err("unbalanced closing tag".to_string());
                }
                let element = stack.pop().expect("stack length checked above");
                stack
                    .last_mut()
                    .expect("document root always present")
                    .children
                    .push(element);
            }
            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| format!("XML text decoding error: {}", e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&value);
                }
            }
            Ok(Event::CData(cdata)) => {
                let value = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&value);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("XML parsing error: {}", e)),
        }
    }
    if stack.len() != 1 {
        return Err("document ended with unclosed elements".to_string());
    }
    Ok(stack.pop().expect("wrapper element"))
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement, String> {
    let mut element = XmlElement {
        name: local_name(start.name().as_ref()),
        ..Default::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| format!("XML attribute error: {}", e))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| format!("XML attribute decoding error: {}", e))?
            .into_owned();
        let full = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let local = local_name(attribute.key.as_ref());
        if full != local {
            element.attributes.push((full, value.clone()));
        }
        element.attributes.push((local, value));
    }
    Ok(element)
}

/// Depth-first search by local name
fn find_element<'a>(root: &'a XmlElement, local_name: &str) -> Option<&'a XmlElement> {
    if root.name == local_name {
        return Some(root);
    }
    root.children
        .iter()
        .find_map(|child| find_element(child, local_name))
}

/// Map the model namespace to a DMN version; unknown assumes 1.3
fn detect_version(definitions: &XmlElement, warnings: &mut Vec<String>) -> DmnVersion {
    let namespaces: Vec<&String> = definitions
        .attributes
        .iter()
        .filter(|(name, _)| name == "xmlns" || name.starts_with("xmlns:"))
        .map(|(_, value)| value)
        .collect();
    for value in &namespaces {
        if value.contains("20151101") {
            return DmnVersion::V1_1;
        }
        if value.contains("20180521") {
            return DmnVersion::V1_2;
        }
        if value.contains("20191111") {
            return DmnVersion::V1_3;
        }
    }
    warnings.push("unrecognized DMN namespace, assuming DMN 1.3".to_string());
    DmnVersion::V1_3
}

// ---- condition-text parsing ----

static RE_COMPARISON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(==|!=|>=|<=|>|<)\s*(.+)$").expect("Invalid regex"));
static RE_IN_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^in\s*\(\s*(.*?)\s*\)$").expect("Invalid regex"));
static RE_NOT_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^not\s*\(\s*(.+?)\s*\)$").expect("Invalid regex"));
static RE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\.\.\s*(.+)$").expect("Invalid regex"));

/// Parse one `inputEntry` text into an operator + operand pair.
///
/// Recognized shapes, in order: comparison (`op expr`), `not(expr)`,
/// `in (v1, v2, ...)`, ranges `lo .. hi` and `[lo..hi]` (both inclusive).
/// Anything else is an equality test against the literal text.
pub fn parse_condition_text(text: &str, type_ref: Option<&str>) -> (String, Value) {
    let trimmed = text.trim();

    if let Some(caps) = RE_COMPARISON.captures(trimmed) {
        let operator = caps.get(1).map(|m| m.as_str()).unwrap_or("==");
        let operand = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        return (operator.to_string(), parse_value(operand, type_ref));
    }
    if let Some(caps) = RE_NOT_CALL.captures(trimmed) {
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        return ("!=".to_string(), parse_value(inner, type_ref));
    }
    if let Some(caps) = RE_IN_CALL.captures(trimmed) {
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let items: Vec<Value> = split_literal_list(body)
            .iter()
            .map(|item| parse_value(item, type_ref))
            .collect();
        return ("in".to_string(), Value::Array(items));
    }
    let range_body = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    if let Some(caps) = RE_RANGE.captures(range_body) {
        let low = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let high = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        return (
            "between".to_string(),
            Value::Array(vec![parse_value(low, type_ref), parse_value(high, type_ref)]),
        );
    }
    ("==".to_string(), parse_value(trimmed, type_ref))
}

/// Split a comma-separated literal list, respecting quoted strings
fn split_literal_list(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            '\\' if in_string => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' if !in_string => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() {
        items.push(last.to_string());
    }
    items
}

/// Parse a literal: strip matching quotes, then coerce by typeRef; with no
/// type hint, recognize boolean/null literals and numbers, defaulting to
/// string
pub fn parse_value(text: &str, type_ref: Option<&str>) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    let unquoted = strip_quotes(trimmed);

    match type_ref.map(|t| t.trim().to_lowercase()).as_deref() {
        Some("integer" | "int" | "long" | "short") => unquoted
            .parse::<i64>()
            .map(|n| Value::Number(Number::from(n)))
            .or_else(|_| {
                // tolerate a decimal spelling of an integral value
                unquoted
                    .parse::<f64>()
                    .map(|n| Value::Number(Number::from(n as i64)))
            })
            .unwrap_or_else(|_| Value::String(unquoted.to_string())),
        Some("double" | "float" | "decimal" | "number") => unquoted
            .parse::<f64>()
            .ok()
            .and_then(|n| {
                // integral values stay integers so round-trips are exact
                if n.fract() == 0.0 && n.abs() < 9e15 {
                    Some(Number::from(n as i64))
                } else {
                    Number::from_f64(n)
                }
            })
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(unquoted.to_string())),
        Some("boolean") => match unquoted.to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(unquoted.to_string()),
        },
        Some(_) => Value::String(unquoted.to_string()),
        None => {
            // quoted text is always a string
            if unquoted.len() != trimmed.len() {
                return Value::String(unquoted.to_string());
            }
            match trimmed {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::Null,
                _ => match trimmed.parse::<i64>() {
                    Ok(n) => Value::Number(Number::from(n)),
                    Err(_) => trimmed
                        .parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(trimmed.to_string())),
                },
            }
        }
    }
}

fn strip_quotes(text: &str) -> &str {
    if text.len() >= 2 {
        if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            return inner;
        }
        if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
            return inner;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCORING_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<definitions xmlns="https://www.omg.org/spec/DMN/20191111/MODEL/" id="defs_1" name="scoring" namespace="http://example.com/dmn">
  <decision id="scoring" name="Category Scoring">
    <decisionTable id="table_1" hitPolicy="COLLECT" aggregation="SUM">
      <input id="category" label="Category">
        <inputExpression typeRef="string"><text>category</text></inputExpression>
      </input>
      <output id="points" label="Points" name="points" typeRef="integer"/>
      <rule id="rule_0">
        <inputEntry id="inputEntry_0_0"><text><![CDATA["A"]]></text></inputEntry>
        <outputEntry id="outputEntry_0_0"><text><![CDATA[100]]></text></outputEntry>
      </rule>
      <rule id="rule_1">
        <inputEntry id="inputEntry_1_0"><text><![CDATA["A"]]></text></inputEntry>
        <outputEntry id="outputEntry_1_0"><text><![CDATA[200]]></text></outputEntry>
      </rule>
    </decisionTable>
  </decision>
</definitions>"#;

    #[test]
    fn test_parse_collect_sum_table() {
        let result = DmnParser::new().parse(SCORING_XML);
        assert!(result.is_ok(), "errors: {:?}", result.errors);
        let definitions = result.definitions.unwrap();
        assert_eq!(definitions.version, DmnVersion::V1_3);
        assert_eq!(definitions.decisions.len(), 1);

        let decision = &definitions.decisions[0];
        assert_eq!(decision.id, "scoring");
        let table = decision.table.as_ref().unwrap();
        assert_eq!(table.hit_policy, HitPolicy::Collect);
        assert_eq!(table.aggregation, Some(Aggregation::Sum));
        assert_eq!(table.rules.len(), 2);
        assert_eq!(table.rules[0].conditions[0].operator, "==");
        assert_eq!(table.rules[0].conditions[0].value, json!("A"));
        assert_eq!(table.rules[0].outputs[0].value, json!(100));
    }

    #[test]
    fn test_namespace_prefix_agnostic() {
        let xml = SCORING_XML
            .replace("<definitions xmlns=", "<dmn:definitions xmlns:dmn=")
            .replace("</definitions>", "</dmn:definitions>")
            .replace("<decision ", "<dmn:decision ")
            .replace("</decision>", "</dmn:decision>")
            .replace("<decisionTable", "<dmn:decisionTable")
            .replace("</decisionTable>", "</dmn:decisionTable>");
        let result = DmnParser::new().parse(&xml);
        assert!(result.is_ok(), "errors: {:?}", result.errors);
        assert_eq!(result.definitions.unwrap().decisions.len(), 1);
    }

    #[test]
    fn test_version_detection() {
        let v12 = SCORING_XML.replace("20191111/MODEL/", "20180521/MODEL/");
        let result = DmnParser::new().parse(&v12);
        assert_eq!(result.definitions.unwrap().version, DmnVersion::V1_2);

        let odd = SCORING_XML.replace(
            "https://www.omg.org/spec/DMN/20191111/MODEL/",
            "http://example.com/no-dmn",
        );
        let result = DmnParser::new().parse(&odd);
        assert_eq!(result.definitions.unwrap().version, DmnVersion::V1_3);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("unrecognized DMN namespace")));
    }

    #[test]
    fn test_unknown_hit_policy_warns_and_defaults_to_first() {
        let xml = SCORING_XML.replace("hitPolicy=\"COLLECT\"", "hitPolicy=\"SOMETIMES\"");
        let result = DmnParser::new().parse(&xml);
        let definitions = result.definitions.unwrap();
        assert_eq!(
            definitions.decisions[0].table.as_ref().unwrap().hit_policy,
            HitPolicy::First
        );
        assert!(result.warnings.iter().any(|w| w.contains("SOMETIMES")));
    }

    #[test]
    fn test_broken_xml_reports_error_not_panic() {
        let result = DmnParser::new().parse("<definitions><decision></definitions>");
        assert!(!result.is_ok());
        assert!(!result.errors.is_empty());

        let result = DmnParser::new().parse("<other/>");
        assert!(result.errors.iter().any(|e| e.contains("definitions")));
    }

    #[test]
    fn test_condition_text_shapes() {
        assert_eq!(
            parse_condition_text(">= 18", Some("integer")),
            (">=".to_string(), json!(18))
        );
        assert_eq!(
            parse_condition_text("< 3.5", Some("double")),
            ("<".to_string(), json!(3.5))
        );
        assert_eq!(
            parse_condition_text("in (\"a\", \"b\", \"c\")", None),
            ("in".to_string(), json!(["a", "b", "c"]))
        );
        assert_eq!(
            parse_condition_text("18 .. 65", Some("integer")),
            ("between".to_string(), json!([18, 65]))
        );
        assert_eq!(
            parse_condition_text("[18..65]", Some("integer")),
            ("between".to_string(), json!([18, 65]))
        );
        assert_eq!(
            parse_condition_text("not(\"gold\")", None),
            ("!=".to_string(), json!("gold"))
        );
        assert_eq!(
            parse_condition_text("\"gold\"", None),
            ("==".to_string(), json!("gold"))
        );
        assert_eq!(
            parse_condition_text("42", None),
            ("==".to_string(), json!(42))
        );
    }

    #[test]
    fn test_value_coercion_by_type_ref() {
        assert_eq!(parse_value("42", Some("integer")), json!(42));
        assert_eq!(parse_value("42.0", Some("integer")), json!(42));
        assert_eq!(parse_value("3.25", Some("double")), json!(3.25));
        assert_eq!(parse_value("TRUE", Some("boolean")), json!(true));
        assert_eq!(parse_value("\"7\"", None), json!("7"));
        assert_eq!(parse_value("7", None), json!(7));
        assert_eq!(parse_value("null", None), Value::Null);
        assert_eq!(parse_value("plain", None), json!("plain"));
    }

    #[test]
    fn test_convert_to_decisions() {
        let decisions = convert_to_decisions(SCORING_XML, Some("acme")).unwrap();
        assert_eq!(decisions.len(), 1);
        let decision = &decisions[0];
        assert_eq!(decision.decision_key, "scoring");
        assert_eq!(decision.version, 1);
        assert_eq!(decision.rule_count, 2);
        assert_eq!(decision.tenant_id.as_deref(), Some("acme"));
        assert_eq!(decision.status, crate::models::DecisionStatus::Draft);
    }

    #[test]
    fn test_dont_care_entries_are_skipped() {
        let xml = SCORING_XML.replace("<![CDATA[\"A\"]]>", "-");
        let result = DmnParser::new().parse(&xml);
        let definitions = result.definitions.unwrap();
        let table = definitions.decisions[0].table.as_ref().unwrap();
        assert!(table.rules[0].conditions.is_empty());
    }
}
