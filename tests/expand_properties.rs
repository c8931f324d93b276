//! Property tests for variable expansion.

use std::collections::BTreeSet;

use kvenv::environment::ConfigMap;
use kvenv::expand::{expand, ExpandError, VariableExpander, MAX_DEPTH_DEFAULT};
use proptest::prelude::*;

fn names(range: std::ops::Range<usize>) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[A-Z][A-Z0-9_]{0,6}", range)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Reference `name` in either syntax.
fn reference(name: &str, braced: bool) -> String {
    if braced {
        format!("${{{}}}", name)
    } else {
        format!("${}", name)
    }
}

proptest! {
    #[test]
    fn chain_expands_regardless_of_naming(chain in names(1..20)) {
        // chain[i] references chain[i - 1]; names are random so key order is too
        let variables: ConfigMap = chain
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = if i == 0 {
                    "base".to_string()
                } else {
                    format!("{}+", reference(&chain[i - 1], i % 2 == 0))
                };
                (name.clone(), value)
            })
            .collect();

        let result = expand(&variables, MAX_DEPTH_DEFAULT).unwrap();
        for (i, name) in chain.iter().enumerate() {
            prop_assert_eq!(&result[name], &format!("base{}", "+".repeat(i)));
        }
    }

    #[test]
    fn acyclic_graph_expands_fully(refs in prop::collection::vec(prop::collection::vec(0usize..100, 0..3), 1..10)) {
        // V{i} references only V{j} with j < i
        let targets: Vec<Vec<usize>> = refs
            .iter()
            .enumerate()
            .map(|(i, picks)| if i == 0 { Vec::new() } else { picks.iter().map(|p| p % i).collect() })
            .collect();

        let variables: ConfigMap = targets
            .iter()
            .enumerate()
            .map(|(i, deps)| {
                let value: String = std::iter::once(format!("v{}", i))
                    .chain(deps.iter().map(|j| format!(":{}", reference(&format!("V{}", j), j % 2 == 0))))
                    .collect();
                (format!("V{}", i), value)
            })
            .collect();

        let mut expected: Vec<String> = Vec::new();
        for (i, deps) in targets.iter().enumerate() {
            let value: String = std::iter::once(format!("v{}", i))
                .chain(deps.iter().map(|j| format!(":{}", expected[*j])))
                .collect();
            expected.push(value);
        }

        let result = expand(&variables, MAX_DEPTH_DEFAULT).unwrap();
        for (i, value) in expected.iter().enumerate() {
            prop_assert_eq!(&result[&format!("V{}", i)], value);
            prop_assert!(!value.contains('$'));
        }
    }

    #[test]
    fn escaped_references_are_never_substituted(target in "[A-Z][A-Z0-9_]{0,6}", braced in any::<bool>()) {
        let literal = reference(&target, braced);
        let mut variables = ConfigMap::new();
        variables.insert(target.clone(), "replaced".to_string());
        variables.insert("ESCAPED_".to_string(), format!("\\{}", literal));

        let result = expand(&variables, MAX_DEPTH_DEFAULT).unwrap();
        prop_assert_eq!(&result["ESCAPED_"], &literal);
    }

    #[test]
    fn isolated_variables_are_roots_once(isolated in names(1..8)) {
        // Isolated variables both reference nothing and are referenced by nothing
        let mut variables: ConfigMap = isolated
            .iter()
            .map(|name| (name.clone(), format!("value of {}", name)))
            .collect();
        variables.insert("lower_base".to_string(), "b".to_string());
        variables.insert("lower_top".to_string(), "$lower_base".to_string());

        let expander = VariableExpander::new(&variables);
        let roots = expander.root_variables();
        let expected: BTreeSet<&str> = isolated
            .iter()
            .map(String::as_str)
            .chain(["lower_base", "lower_top"])
            .collect();
        prop_assert_eq!(roots, expected);

        let result = expander.expand(MAX_DEPTH_DEFAULT).unwrap();
        prop_assert_eq!(result.len(), variables.len());
        prop_assert_eq!(&result["lower_top"], "b");
    }

    #[test]
    fn mutual_references_are_loops(a in "[A-M]{1,4}", b in "[N-Z]{1,4}") {
        let mut variables = ConfigMap::new();
        variables.insert(a.clone(), format!("${}", b));
        variables.insert(b.clone(), format!("${{{}}}", a));
        prop_assert!(matches!(expand(&variables, MAX_DEPTH_DEFAULT), Err(ExpandError::Loop(_))));
    }
}
