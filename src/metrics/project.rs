//! Project-level aggregates. Always recomputed from files, symbols and edges.

use super::maintainability::technical_debt_ratio;
use crate::config::ComplexityThresholds;
use crate::types::*;

/// Derive project metrics from one analysis pass.
pub fn derive_project_metrics(
    files: &[FileRecord],
    symbols: &[Symbol],
    relationships: &[Relationship],
    thresholds: &ComplexityThresholds,
) -> ProjectMetrics {
    let mut m = ProjectMetrics {
        total_files: files.len() as u32,
        ..ProjectMetrics::default()
    };

    for file in files {
        m.total_lines += file.total_lines;
        m.total_code_lines += file.code_lines;
        m.total_comment_lines += file.comment_lines;
        *m.language_distribution.entry(file.language).or_default() += 1;
    }
    if !files.is_empty() {
        m.maintainability_score =
            files.iter().map(|f| f.maintainability_index).sum::<f64>() / files.len() as f64;
    } else {
        m.maintainability_score = 100.0;
    }

    let mut cyclomatic_sum = 0u64;
    let mut cognitive_sum = 0u64;
    for symbol in symbols {
        *m.symbol_kind_distribution.entry(symbol.kind).or_default() += 1;
        if !symbol.is_file_module() {
            m.total_symbols += 1;
        }
        match symbol.kind {
            SymbolKind::Class | SymbolKind::Interface | SymbolKind::Enum => m.total_classes += 1,
            kind if kind.is_callable() => {
                m.total_functions += 1;
                let cc = symbol.metrics.cyclomatic;
                cyclomatic_sum += cc as u64;
                cognitive_sum += symbol.metrics.cognitive as u64;
                m.max_complexity = m.max_complexity.max(cc);
                m.max_cognitive = m.max_cognitive.max(symbol.metrics.cognitive);
                if symbol.metrics.cognitive > thresholds.high_cognitive {
                    m.hard_to_read += 1;
                }
                let bucket = &mut m.complexity_distribution;
                match cc {
                    0..=5 => bucket.low += 1,
                    6..=10 => bucket.medium += 1,
                    11..=20 => bucket.high += 1,
                    _ => bucket.very_high += 1,
                }
            }
            _ => {}
        }
    }
    if m.total_functions > 0 {
        m.average_complexity = cyclomatic_sum as f64 / m.total_functions as f64;
        m.average_cognitive = cognitive_sum as f64 / m.total_functions as f64;
    }

    m.technical_debt_ratio = technical_debt_ratio(symbols, thresholds.high_complexity);

    let mut dependency_edges = 0u64;
    for rel in relationships {
        *m.relationship_distribution.entry(rel.kind).or_default() += 1;
        if rel.kind != RelationType::Contains {
            dependency_edges += 1;
        }
    }
    let nodes = symbols.len() as f64;
    if nodes > 1.0 {
        m.graph_density = dependency_edges as f64 / (nodes * (nodes - 1.0));
    }

    let complexity_score = (100.0 - 5.0 * m.average_complexity).max(0.0);
    m.quality_score = 0.4 * complexity_score + 0.6 * m.maintainability_score;

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, kind: SymbolKind, cc: u32) -> Symbol {
        Symbol {
            id: SymbolId::derive("a.py", name, kind),
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind,
            language: Language::Python,
            file_path: "a.py".into(),
            location: Location::default(),
            parent: None,
            metrics: SymbolMetrics {
                cyclomatic: cc,
                cognitive: cc.saturating_sub(1),
                ..SymbolMetrics::default()
            },
            access: AccessLevel::Public,
            flags: SymbolFlags::default(),
            docstring: None,
            signature: None,
        }
    }

    #[test]
    fn test_aggregates() {
        let symbols = vec![
            symbol("", SymbolKind::Module, 14),
            symbol("Service", SymbolKind::Class, 13),
            symbol("small", SymbolKind::Function, 1),
            symbol("big", SymbolKind::Method, 12),
            symbol("LIMIT", SymbolKind::Constant, 0),
        ];
        let m = derive_project_metrics(&[], &symbols, &[], &ComplexityThresholds::default());
        assert_eq!(m.total_functions, 2);
        assert_eq!(m.total_classes, 1);
        assert_eq!(m.total_symbols, 4);
        assert_eq!(m.max_complexity, 12);
        assert!((m.average_complexity - 6.5).abs() < 1e-9);
        assert_eq!(m.complexity_distribution.low, 1);
        assert_eq!(m.complexity_distribution.high, 1);
        // Service (13) and big (12) exceed 10, out of 4 non-module symbols
        assert!((m.technical_debt_ratio - 0.5).abs() < 1e-9);
        assert_eq!(m.maintainability_score, 100.0);
        assert_eq!(m.hard_to_read, 0);
    }

    #[test]
    fn test_cognitive_threshold_counts_callables_only() {
        let symbols = vec![
            symbol("", SymbolKind::Module, 30),
            symbol("Service", SymbolKind::Class, 30),
            symbol("tangled", SymbolKind::Function, 12),
            symbol("plain", SymbolKind::Function, 3),
        ];
        let thresholds = ComplexityThresholds {
            high_complexity: 10,
            high_cognitive: 10,
        };
        // cognitive is cc - 1: tangled 11, plain 2
        let m = derive_project_metrics(&[], &symbols, &[], &thresholds);
        assert_eq!(m.hard_to_read, 1);
    }
}
