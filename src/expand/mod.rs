//! Variable expansion.
//!
//! # Data Flow
//! ```text
//! Config Map
//!     → reference extraction ($NAME, ${NAME}, escaped \$NAME skipped)
//!     → dependency graph (variable → variables it references)
//!     → loop checks (no root, mutual references)
//!     → depth-first order over dependents, depth bounded
//!     → substitution in dependency order
//!     → Expanded Map
//! ```
//!
//! # Design Decisions
//! - Roots are the union of variables with no references and variables
//!   nobody references
//! - References to names that are not defined expand to the empty string
//!   and do not take part in ordering
//! - A variable reached again while its own dependents are being ordered
//!   is a loop, reported as such

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::environment::ConfigMap;

/// Default bound on variable reference chains.
pub const MAX_DEPTH_DEFAULT: usize = 50;

/// Same keys as the Config Map, placeholders substituted.
pub type ExpandedMap = ConfigMap;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\\?)\$(?:\{([A-Za-z0-9_]+)\}|([A-Za-z0-9_]+))").expect("reference pattern is valid")
});

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("variable loop: {0}")]
    Loop(String),

    #[error("variable references nest deeper than {max_depth}")]
    DepthLimit { max_depth: usize },
}

/// Expand every variable of `variables`.
pub fn expand(variables: &ConfigMap, max_depth: usize) -> Result<ExpandedMap, ExpandError> {
    VariableExpander::new(variables).expand(max_depth)
}

fn is_escaped(caps: &Captures<'_>) -> bool {
    caps.get(1).is_some_and(|m| !m.as_str().is_empty())
}

fn reference_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(2)
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
}

/// Names referenced (and not escaped) in `value`, in order of appearance.
pub fn referenced_names(value: &str) -> Vec<&str> {
    REFERENCE
        .captures_iter(value)
        .filter(|caps| !is_escaped(caps))
        .map(|caps| reference_name(&caps))
        .collect()
}

/// Replace references in `value` with entries of `resolved`. Escaped
/// references lose their backslash and are kept literally.
pub fn substitute(value: &str, resolved: &ExpandedMap) -> String {
    REFERENCE
        .replace_all(value, |caps: &Captures<'_>| {
            if is_escaped(caps) {
                caps[0][1..].to_string()
            } else {
                resolved
                    .get(reference_name(caps))
                    .cloned()
                    .unwrap_or_default()
            }
        })
        .into_owned()
}

enum Mark {
    /// Dependents are being ordered right now.
    Active,
    /// Ordered; number of variables on the longest dependent chain from here.
    Done(usize),
}

struct Traversal<'a> {
    marks: HashMap<&'a str, Mark>,
    order: Vec<&'a str>,
    max_depth: usize,
}

/// Dependency graph over one Config Map.
pub struct VariableExpander<'a> {
    variables: &'a ConfigMap,
    references: BTreeMap<&'a str, BTreeSet<&'a str>>,
    dependents: BTreeMap<&'a str, Vec<&'a str>>,
}

impl<'a> VariableExpander<'a> {
    pub fn new(variables: &'a ConfigMap) -> Self {
        let references: BTreeMap<&str, BTreeSet<&str>> = variables
            .iter()
            .map(|(name, value)| {
                let refs = referenced_names(value)
                    .into_iter()
                    .filter(|r| variables.contains_key(*r))
                    .collect();
                (name.as_str(), refs)
            })
            .collect();

        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, refs) in &references {
            for r in refs {
                dependents.entry(*r).or_default().push(*name);
            }
        }

        Self {
            variables,
            references,
            dependents,
        }
    }

    /// Variables that reference nothing, plus variables nothing references.
    pub fn root_variables(&self) -> BTreeSet<&'a str> {
        let no_references = self
            .references
            .iter()
            .filter(|(_, refs)| refs.is_empty())
            .map(|(name, _)| *name);
        let unreferenced = self
            .references
            .keys()
            .filter(|name| !self.dependents.contains_key(*name))
            .copied();
        no_references.chain(unreferenced).collect()
    }

    fn detect_loop(&self, roots: &BTreeSet<&'a str>) -> Result<(), ExpandError> {
        if roots.is_empty() && !self.variables.is_empty() {
            return Err(ExpandError::Loop(
                "no root variable; every variable is referenced by another".to_string(),
            ));
        }
        for (name, refs) in &self.references {
            for r in refs {
                if self.references.get(r).is_some_and(|back| back.contains(name)) {
                    return Err(ExpandError::Loop(format!("${} and ${} reference each other", r, name)));
                }
            }
        }
        Ok(())
    }

    /// Variables in substitution order: each after everything it references.
    pub fn solve_order(&self, max_depth: usize) -> Result<Vec<&'a str>, ExpandError> {
        let roots = self.root_variables();
        self.detect_loop(&roots)?;

        let mut traversal = Traversal {
            marks: HashMap::new(),
            order: Vec::with_capacity(self.variables.len()),
            max_depth,
        };
        for &root in &roots {
            self.visit(root, 1, &mut traversal)?;
        }

        if traversal.order.len() < self.variables.len() {
            let stuck: Vec<_> = self
                .references
                .keys()
                .filter(|name| !traversal.marks.contains_key(*name))
                .map(|name| format!("${}", name))
                .collect();
            return Err(ExpandError::Loop(format!(
                "{} cannot be ordered from any root",
                stuck.join(", ")
            )));
        }

        let mut order = traversal.order;
        order.reverse();
        Ok(order)
    }

    /// Order everything depending on `name`, then `name` itself. Returns the
    /// length of the longest dependent chain starting at `name`.
    fn visit(&self, name: &'a str, depth: usize, t: &mut Traversal<'a>) -> Result<usize, ExpandError> {
        match t.marks.get(name) {
            Some(Mark::Active) => {
                return Err(ExpandError::Loop(format!("${} depends on itself", name)));
            }
            Some(Mark::Done(height)) => {
                if depth + height - 1 >= t.max_depth {
                    return Err(ExpandError::DepthLimit {
                        max_depth: t.max_depth,
                    });
                }
                return Ok(*height);
            }
            None => {}
        }
        if depth >= t.max_depth {
            return Err(ExpandError::DepthLimit {
                max_depth: t.max_depth,
            });
        }

        t.marks.insert(name, Mark::Active);
        let mut height = 1;
        for &dependent in self.dependents.get(name).into_iter().flatten() {
            height = height.max(1 + self.visit(dependent, depth + 1, t)?);
        }
        t.marks.insert(name, Mark::Done(height));
        t.order.push(name);
        Ok(height)
    }

    pub fn expand(&self, max_depth: usize) -> Result<ExpandedMap, ExpandError> {
        let mut result = ExpandedMap::new();
        for name in self.solve_order(max_depth)? {
            let value = substitute(&self.variables[name], &result);
            result.insert(name.to_string(), value);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(entries: &[(&str, &str)]) -> ConfigMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expand_str(value: &str) -> String {
        let variables = vars(&[("VAR", "var"), ("VAR2", "var2"), ("STR", value)]);
        expand(&variables, MAX_DEPTH_DEFAULT).unwrap()["STR"].clone()
    }

    #[test]
    fn test_single_expansion() {
        assert_eq!(expand_str(""), "");
        assert_eq!(expand_str("$VAR"), "var");
        assert_eq!(expand_str("${VAR}"), "var");
        assert_eq!(expand_str("$NOVAR"), "");
        assert_eq!(expand_str("foo $VAR baz"), "foo var baz");
        assert_eq!(expand_str("foo ${VAR} baz"), "foo var baz");
        assert_eq!(expand_str("${VAR}${VAR}"), "varvar");
        assert_eq!(expand_str("${VAR}${VAR2}"), "varvar2");
    }

    #[test]
    fn test_escaped_references() {
        assert_eq!(expand_str("\\$VAR"), "$VAR");
        assert_eq!(expand_str("\\${VAR}"), "${VAR}");
        assert_eq!(expand_str("$VAR \\$VAR $VAR"), "var $VAR var");
    }

    #[test]
    fn test_non_references_are_literal() {
        assert_eq!(expand_str("cost: $"), "cost: $");
        assert_eq!(expand_str("${VAR"), "${VAR");
        assert_eq!(expand_str("$(date)"), "$(date)");
        assert_eq!(expand_str("$VAR-x"), "var-x");
    }

    #[test]
    fn test_referenced_names_skip_escapes() {
        assert_eq!(referenced_names("$A ${B} \\$C \\${D} $A"), vec!["A", "B", "A"]);
    }

    #[test]
    fn test_multiple_expansions() {
        let result = expand(&vars(&[("VAR2", "${VAR}"), ("VAR", "var")]), MAX_DEPTH_DEFAULT).unwrap();
        assert_eq!(result, vars(&[("VAR", "var"), ("VAR2", "var")]));
    }

    #[test]
    fn test_nested_multiple_expansions() {
        let variables = vars(&[
            ("VAR2", "${VAR}"),
            ("BAR", "${FOO} bar ${BAZ}"),
            ("VAR", "${VALUE}"),
            ("FOO", "foo ${VAR}"),
            ("BAZ", "baz ${VAR}"),
            ("VALUE", "var"),
        ]);
        let result = expand(&variables, MAX_DEPTH_DEFAULT).unwrap();
        assert_eq!(
            result,
            vars(&[
                ("VALUE", "var"),
                ("VAR", "var"),
                ("FOO", "foo var"),
                ("BAZ", "baz var"),
                ("BAR", "foo var bar baz var"),
                ("VAR2", "var"),
            ])
        );
    }

    #[test]
    fn test_solve_order_puts_dependencies_first() {
        let variables = vars(&[("A", "$B"), ("B", "$C"), ("C", "c")]);
        let order = VariableExpander::new(&variables).solve_order(MAX_DEPTH_DEFAULT).unwrap();
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_root_variables_union() {
        // LONE has no references and is unreferenced; it qualifies twice
        let variables = vars(&[("LONE", "x"), ("BASE", "b"), ("TOP", "$BASE"), ("GHOST", "$MISSING")]);
        let expander = VariableExpander::new(&variables);
        let roots: Vec<_> = expander.root_variables().into_iter().collect();
        assert_eq!(roots, vec!["BASE", "GHOST", "LONE", "TOP"]);

        let result = expander.expand(MAX_DEPTH_DEFAULT).unwrap();
        assert_eq!(result["GHOST"], "");
        assert_eq!(result["TOP"], "b");
        assert_eq!(result["LONE"], "x");
    }

    #[test]
    fn test_undefined_reference_does_not_hide_variable() {
        let variables = vars(&[("A", "pre-$MISSING"), ("B", "$A!")]);
        let result = expand(&variables, MAX_DEPTH_DEFAULT).unwrap();
        assert_eq!(result, vars(&[("A", "pre-"), ("B", "pre-!")]));
    }

    #[test]
    fn test_mutual_reference_is_loop() {
        let variables = vars(&[("VAR2", "${VAR}"), ("VAR", "${VAR2}")]);
        assert!(matches!(expand(&variables, MAX_DEPTH_DEFAULT), Err(ExpandError::Loop(_))));

        let with_root = vars(&[("ROOT", "${VAR}"), ("VAR2", "${VAR}"), ("VAR", "${VAR2}")]);
        assert!(matches!(expand(&with_root, MAX_DEPTH_DEFAULT), Err(ExpandError::Loop(_))));
    }

    #[test]
    fn test_self_reference_is_loop() {
        let variables = vars(&[("A", "$A")]);
        assert!(matches!(expand(&variables, MAX_DEPTH_DEFAULT), Err(ExpandError::Loop(_))));
    }

    #[test]
    fn test_rootless_cycle_is_loop() {
        let variables = vars(&[("VAR", "${VAR2}"), ("VAR2", "${VAR3}"), ("VAR3", "${VAR}")]);
        assert!(matches!(expand(&variables, MAX_DEPTH_DEFAULT), Err(ExpandError::Loop(_))));
    }

    #[test]
    fn test_cycle_below_a_root_is_loop() {
        let variables = vars(&[("R", "r"), ("A", "$R $C"), ("B", "$A"), ("C", "$B")]);
        assert!(matches!(expand(&variables, MAX_DEPTH_DEFAULT), Err(ExpandError::Loop(_))));
    }

    #[test]
    fn test_unreachable_cycle_is_loop() {
        let variables = vars(&[("R", "r"), ("A", "$B"), ("B", "$C"), ("C", "$A")]);
        match expand(&variables, MAX_DEPTH_DEFAULT) {
            Err(ExpandError::Loop(message)) => assert!(message.contains("$A")),
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_exceed_max_depth() {
        // VARi references every VARj with j < i
        let variables: ConfigMap = (1..=50)
            .map(|i| {
                let value: String = (1..i).map(|j| format!("${{VAR{}}}", j)).collect();
                (format!("VAR{}", i), value)
            })
            .collect();
        assert!(matches!(
            expand(&variables, MAX_DEPTH_DEFAULT),
            Err(ExpandError::DepthLimit { max_depth: 50 })
        ));
    }

    #[test]
    fn test_chain_within_depth() {
        let variables: ConfigMap = (1..=49)
            .map(|i| {
                let value = if i == 1 { "base".to_string() } else { format!("$V{}", i - 1) };
                (format!("V{}", i), value)
            })
            .collect();
        let result = expand(&variables, MAX_DEPTH_DEFAULT).unwrap();
        assert!(result.values().all(|v| v == "base"));
        assert!(matches!(expand(&variables, 49), Err(ExpandError::DepthLimit { .. })));
    }

    #[test]
    fn test_empty() {
        assert_eq!(expand(&ConfigMap::new(), MAX_DEPTH_DEFAULT).unwrap(), ConfigMap::new());
    }
}
