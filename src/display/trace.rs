use crate::analysis::topology;
use crate::compute::{Engine, Ledger};
use crate::report::{format, Row};
use crate::store::{AttributeStore, IndicatorId, RecordId, Registry};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders how `target` is evaluated for `record`, operands as children.
pub fn format_trace(
    registry: &Registry,
    attributes: &dyn AttributeStore,
    record: RecordId,
    target: IndicatorId,
) -> String {
    let mut tracer = Tracer {
        registry,
        engine: Engine::new(registry, attributes),
        ledger: Ledger::new(),
        record,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match registry.indicator(target) {
        Ok(indicator) => {
            let depends_on = topology::upstream_of(registry, target).len().saturating_sub(1);
            let _ = writeln!(tracer.output, "AUDIT TRACE for indicator '{}' on record {}:", indicator.name, record);
            let _ = writeln!(tracer.output, "Depends on {} indicator(s)", depends_on);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_indicator(target, 1, "");
        }
        Err(e) => {
            let _ = writeln!(tracer.output, "Error: {}", e);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    registry: &'a Registry,
    engine: Engine<'a>,
    ledger: Ledger,
    record: RecordId,
    visited_at_level: HashMap<IndicatorId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_indicator(&mut self, id: IndicatorId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&id) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(id, level);

        let registry = self.registry;
        let Ok(indicator) = registry.indicator(id) else {
            let _ = writeln!(self.output, "{}[L{}] <missing {}>", prefix, level, id);
            return;
        };
        let kind = indicator.strategy.map_or("unbound", |k| k.name());
        let value = match self.engine.resolve(id, self.record, &Row::new(), &mut self.ledger) {
            Ok(Some(v)) => format::format_value(&v, "%Y-%m-%d").unwrap_or_else(|e| format!("<error: {}>", e)),
            Ok(None) => "<absent>".to_string(),
            Err(e) => format!("<error: {}>", e),
        };
        let _ = writeln!(self.output, "{}[L{}] {} = {} [{}]", prefix, level, indicator.name, kind, value);

        let params = registry.parameters_of(id);
        let stem = self.build_child_stem(prefix);
        for (i, &child) in params.iter().enumerate() {
            let connector = if i == params.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_indicator(child, level + 1, &full_prefix);
        }
    }

    fn build_child_stem(&self, prefix: &str) -> String {
        prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Datatype, EavStore, StrategyKind};
    use chrono::NaiveDate;

    #[test]
    fn test_trace_tree() {
        let mut reg = Registry::new();
        let report = reg.create_report("Square");
        let ch = reg.create_concept("Height", Datatype::Int);
        let cw = reg.create_concept("Width", Datatype::Int);
        let h = reg.create_indicator_from_concept(ch, StrategyKind::Value, None, &[]).unwrap();
        let w = reg.create_indicator_from_concept(cw, StrategyKind::Value, None, &[]).unwrap();
        let area = reg.create_indicator_with_new_concept("Area", Datatype::Int, StrategyKind::Product, &[h, w]).unwrap();
        let avg = reg.create_indicator_with_new_concept("Average", Datatype::Float, StrategyKind::Ratio, &[h, area]).unwrap();
        let record = reg.create_record(report, NaiveDate::from_ymd_opt(2011, 5, 1).unwrap()).unwrap();
        let mut eav = EavStore::new();
        eav.set(record, "height", 10);
        eav.set(record, "width", 2);

        let out = format_trace(&reg, &eav, record, avg);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("'Average'"));
        assert_eq!(lines[1], "Depends on 3 indicator(s)");
        assert_eq!(lines[3], "[L1] Average = ratio [0.5]");
        assert_eq!(lines[4], "|--[L2] Height = value [10]");
        assert_eq!(lines[5], "`--[L2] Area = product [20]");
        assert_eq!(lines[6], "   |---> (Ref to L2)");
        assert_eq!(lines[7], "   `--[L3] Width = value [2]");
    }

    #[test]
    fn test_trace_shows_errors() {
        let mut reg = Registry::new();
        let report = reg.create_report("Square");
        let ch = reg.create_concept("Height", Datatype::Int);
        let h = reg.create_indicator_from_concept(ch, StrategyKind::Value, None, &[]).unwrap();
        let r = reg.create_indicator_with_new_concept("Shape", Datatype::Float, StrategyKind::Ratio, &[h, h]).unwrap();
        let record = reg.create_record(report, NaiveDate::from_ymd_opt(2011, 5, 1).unwrap()).unwrap();
        let mut eav = EavStore::new();
        eav.set(record, "height", 0);

        let out = format_trace(&reg, &eav, record, r);
        assert!(out.contains("Shape = ratio [<error: Division by zero at indicator 'Shape'>]"), "{}", out);
    }
}
