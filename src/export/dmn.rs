//! DMN XML emitter
//!
//! Renders stored decisions as well-formed OMG DMN XML (1.3 by default,
//! 1.1 / 1.2 selectable). Entry ids are synthesized deterministically
//! (`inputEntry_<rule>_<column>`), condition text is the inverse of the
//! parser's rules, and rule entry text is wrapped in CDATA.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::Value;

use super::ExportError;
use crate::import::dmn::DmnVersion;
use crate::models::{Condition, Decision, HitPolicy};

/// Exporter configuration
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Target interchange version
    pub version: DmnVersion,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            version: DmnVersion::V1_3,
        }
    }
}

impl ExportOptions {
    /// Target a specific DMN version
    pub fn with_version(mut self, version: DmnVersion) -> Self {
        self.version = version;
        self
    }
}

/// DMN XML exporter
#[derive(Debug, Default)]
pub struct DmnExporter;

impl DmnExporter {
    pub fn new() -> Self {
        Self
    }

    /// Render one decision as a complete `definitions` document
    pub fn export(&self, decision: &Decision, options: &ExportOptions) -> Result<String, ExportError> {
        self.export_all(std::slice::from_ref(decision), options)
    }

    /// Render several decisions into one `definitions` document
    pub fn export_all(
        &self,
        decisions: &[Decision],
        options: &ExportOptions,
    ) -> Result<String, ExportError> {
        if decisions.is_empty() {
            return Err(ExportError::UnsupportedDecision(
                "nothing to export".to_string(),
            ));
        }
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialization_error)?;

        let mut definitions = BytesStart::new("definitions");
        definitions.push_attribute(("xmlns", options.version.namespace()));
        definitions.push_attribute(("xmlns:dmndi", "https://www.omg.org/spec/DMN/20191111/DMNDI/"));
        definitions.push_attribute(("xmlns:dc", "http://www.omg.org/spec/DMN/20180521/DC/"));
        definitions.push_attribute(("xmlns:di", "http://www.omg.org/spec/DMN/20180521/DI/"));
        definitions.push_attribute((
            "id",
            format!("definitions_{}", decisions[0].decision_key).as_str(),
        ));
        definitions.push_attribute(("name", decisions[0].name.as_str()));
        definitions.push_attribute((
            "namespace",
            format!("http://dmn-engine.io/definitions/{}", decisions[0].decision_key).as_str(),
        ));
        definitions.push_attribute(("exporter", "dmn-engine"));
        definitions.push_attribute(("exporterVersion", env!("CARGO_PKG_VERSION")));
        writer
            .write_event(Event::Start(definitions))
            .map_err(serialization_error)?;

        for decision in decisions {
            self.write_decision(&mut writer, decision)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("definitions")))
            .map_err(serialization_error)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| ExportError::SerializationError(e.to_string()))
    }

    fn write_decision(
        &self,
        writer: &mut Writer<Vec<u8>>,
        decision: &Decision,
    ) -> Result<(), ExportError> {
        let mut element = BytesStart::new("decision");
        element.push_attribute(("id", decision.decision_key.as_str()));
        element.push_attribute(("name", decision.name.as_str()));
        writer
            .write_event(Event::Start(element))
            .map_err(serialization_error)?;

        if let Some(description) = &decision.description {
            write_text_element(writer, "description", description)?;
        }

        let mut table = BytesStart::new("decisionTable");
        table.push_attribute(("id", format!("decisionTable_{}", decision.decision_key).as_str()));
        table.push_attribute(("hitPolicy", decision.hit_policy.as_dmn()));
        if decision.hit_policy == HitPolicy::Collect {
            if let Some(aggregation) = decision.aggregation {
                table.push_attribute(("aggregation", aggregation.as_dmn()));
            }
        }
        writer
            .write_event(Event::Start(table))
            .map_err(serialization_error)?;

        for input in &decision.inputs {
            let mut element = BytesStart::new("input");
            element.push_attribute(("id", input.id.as_str()));
            element.push_attribute(("label", input.label.as_str()));
            writer
                .write_event(Event::Start(element))
                .map_err(serialization_error)?;

            let mut expression = BytesStart::new("inputExpression");
            expression.push_attribute(("id", format!("inputExpression_{}", input.id).as_str()));
            if let Some(type_ref) = &input.type_ref {
                expression.push_attribute(("typeRef", type_ref.as_str()));
            }
            writer
                .write_event(Event::Start(expression))
                .map_err(serialization_error)?;
            write_text_element(writer, "text", &input.expression)?;
            writer
                .write_event(Event::End(BytesEnd::new("inputExpression")))
                .map_err(serialization_error)?;

            writer
                .write_event(Event::End(BytesEnd::new("input")))
                .map_err(serialization_error)?;
        }

        for output in &decision.outputs {
            let mut element = BytesStart::new("output");
            element.push_attribute(("id", output.id.as_str()));
            element.push_attribute(("label", output.label.as_str()));
            element.push_attribute(("name", output.name.as_str()));
            if let Some(type_ref) = &output.type_ref {
                element.push_attribute(("typeRef", type_ref.as_str()));
            }
            if output.output_values.is_empty() {
                writer
                    .write_event(Event::Empty(element))
                    .map_err(serialization_error)?;
            } else {
                writer
                    .write_event(Event::Start(element))
                    .map_err(serialization_error)?;
                writer
                    .write_event(Event::Start(BytesStart::new("outputValues")))
                    .map_err(serialization_error)?;
                let rendered: Vec<String> =
                    output.output_values.iter().map(render_literal).collect();
                write_text_element(writer, "text", &rendered.join(","))?;
                writer
                    .write_event(Event::End(BytesEnd::new("outputValues")))
                    .map_err(serialization_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new("output")))
                    .map_err(serialization_error)?;
            }
        }

        for (rule_index, rule) in decision.rules.iter().enumerate() {
            self.write_rule(writer, decision, rule_index)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("decisionTable")))
            .map_err(serialization_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("decision")))
            .map_err(serialization_error)?;
        Ok(())
    }

    fn write_rule(
        &self,
        writer: &mut Writer<Vec<u8>>,
        decision: &Decision,
        rule_index: usize,
    ) -> Result<(), ExportError> {
        let rule = &decision.rules[rule_index];
        let mut element = BytesStart::new("rule");
        element.push_attribute(("id", rule.id.as_str()));
        writer
            .write_event(Event::Start(element))
            .map_err(serialization_error)?;

        if let Some(description) = &rule.description {
            write_text_element(writer, "description", description)?;
        }

        // one entry per input column, in declared column order
        for (column, input) in decision.inputs.iter().enumerate() {
            let condition = rule.conditions.iter().find(|c| c.input_id == input.id);
            let text = match condition {
                Some(condition) => render_condition(condition),
                // don't-care column
                None => "-".to_string(),
            };
            write_entry(
                writer,
                "inputEntry",
                &format!("inputEntry_{}_{}", rule_index, column),
                &text,
            )?;
        }

        for (column, output) in decision.outputs.iter().enumerate() {
            let value = rule
                .outputs
                .iter()
                .find(|o| o.output_id == output.id)
                .map(|o| o.value.clone())
                .unwrap_or(Value::Null);
            write_entry(
                writer,
                "outputEntry",
                &format!("outputEntry_{}_{}", rule_index, column),
                &render_literal(&value),
            )?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("rule")))
            .map_err(serialization_error)?;
        Ok(())
    }
}

/// Render one condition as DMN entry text, the inverse of the parser:
/// `!=` becomes `not(...)`, `between` becomes `[lo..hi]`, `in` becomes an
/// `in (...)` literal list; unknown operators degrade to their operand.
pub fn render_condition(condition: &Condition) -> String {
    match condition.operator.as_str() {
        "==" | "equals" | "equal" => render_literal(&condition.value),
        "!=" | "notEquals" => format!("not({})", render_literal(&condition.value)),
        ">" | ">=" | "<" | "<=" => format!(
            "{} {}",
            condition.operator,
            render_literal(&condition.value)
        ),
        "between" => match condition.value.as_array() {
            Some(bounds) if bounds.len() == 2 => format!(
                "[{}..{}]",
                render_literal(&bounds[0]),
                render_literal(&bounds[1])
            ),
            _ => render_literal(&condition.value),
        },
        "in" => match condition.value.as_array() {
            Some(items) => {
                let rendered: Vec<String> = items.iter().map(render_literal).collect();
                format!("in ({})", rendered.join(", "))
            }
            None => format!("in ({})", render_literal(&condition.value)),
        },
        _ => render_literal(&condition.value),
    }
}

/// Render a JSON scalar as DMN literal text; strings are double-quoted
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => other.to_string(),
    }
}

fn write_entry(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    id: &str,
    text: &str,
) -> Result<(), ExportError> {
    let mut element = BytesStart::new(tag);
    element.push_attribute(("id", id));
    writer
        .write_event(Event::Start(element))
        .map_err(serialization_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("text")))
        .map_err(serialization_error)?;
    writer
        .write_event(Event::CData(BytesCData::new(text)))
        .map_err(serialization_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("text")))
        .map_err(serialization_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(serialization_error)?;
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    tag: &str,
    text: &str,
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(serialization_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(serialization_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(serialization_error)?;
    Ok(())
}

fn serialization_error(e: quick_xml::Error) -> ExportError {
    ExportError::SerializationError(e.to_string())
}
