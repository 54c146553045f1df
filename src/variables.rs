//! Named hyperparameters and variable-set merging.

/// A named scalar hyperparameter with a fixed/free flag.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    /// Hyperparameter name, unique within its owning function.
    pub name: String,
    /// Current value.
    pub value: f64,
    /// Fixed variables are neither optimized nor differentiated.
    pub fixed: bool,
}

/// An ordered collection of named hyperparameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariableSet {
    vars: Vec<Variable>,
}

impl VariableSet {
    /// An empty set.
    pub fn new() -> Self {
        VariableSet::default()
    }

    /// Append a variable, keeping declaration order.
    pub fn push(&mut self, name: &str, value: f64, fixed: bool) {
        self.vars.push(Variable {
            name: name.to_string(),
            value,
            fixed,
        });
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the set holds no variables.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Look a variable up by name.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// The subset of variables not marked fixed, in declaration order.
    pub fn select_free(&self) -> VariableSet {
        VariableSet {
            vars: self.vars.iter().filter(|v| !v.fixed).cloned().collect(),
        }
    }

    /// Values in declaration order.
    pub fn values(&self) -> Vec<f64> {
        self.vars.iter().map(|v| v.value).collect()
    }
}

/// Merge variable sets from several owners into one flat set.
///
/// Each name is qualified with its owner's role so equally named variables
/// from different owners never collide. Iteration order is the group
/// order, then each owner's declared order.
pub fn merge_variables(groups: &[(&str, &VariableSet)]) -> VariableSet {
    let mut merged = VariableSet::new();
    for (owner, set) in groups {
        for var in set.iter() {
            merged.push(&format!("{owner}.{}", var.name), var.value, var.fixed);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_free() {
        let mut vars = VariableSet::new();
        vars.push("offset", 0.5, true);
        vars.push("logscale", 0.0, false);

        let free = vars.select_free();
        assert_eq!(free.len(), 1);
        assert_eq!(free.get("logscale").unwrap().value, 0.0);
        assert!(free.get("offset").is_none());
    }

    #[test]
    fn test_merge_qualifies_and_keeps_order() {
        let mut mean = VariableSet::new();
        mean.push("offset", 0.5, false);
        let mut cov = VariableSet::new();
        cov.push("logscale", 1.0, false);
        cov.push("offset", 2.0, false); // same bare name as the mean's

        let merged = merge_variables(&[("mean", &mean), ("cov", &cov)]);
        let names: Vec<&str> = merged.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["mean.offset", "cov.logscale", "cov.offset"]);
        assert_eq!(merged.values(), vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_merge_of_empty_sets() {
        let empty = VariableSet::new();
        let merged = merge_variables(&[("mean", &empty), ("cov", &empty)]);
        assert!(merged.is_empty());
    }
}
