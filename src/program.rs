//! A minimisation problem held in `good_lp` terms but not yet bound to a backend.
//!
//! `good_lp` consumes its `ProblemVariables` as soon as an objective is set, so
//! the model builder collects variables, named constraints and the objective
//! here and a [`crate::solver::MilpSolver`] instantiates them on demand.

use std::fmt;

use good_lp::{
    Constraint, Expression, IntoAffineExpression, ProblemVariables, Variable, VariableDefinition,
};

#[derive(Clone, Default)]
pub struct LinearProgram {
    variables: ProblemVariables,
    constraints: Vec<Constraint>,
    objective: Expression,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, definition: VariableDefinition) -> Variable {
        self.variables.add(definition)
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, constraint: Constraint) {
        self.constraints.push(constraint.set_name(name.into()));
    }

    pub fn set_objective(&mut self, objective: impl IntoAffineExpression) {
        self.objective = Expression::from_other_affine(objective);
    }

    pub fn variables(&self) -> &ProblemVariables {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Expression {
        &self.objective
    }

    /// Handles of every variable, in creation order.
    pub fn handles(&self) -> Vec<Variable> {
        self.variables.iter_variables_with_def().map(|(var, _)| var).collect()
    }

    pub fn integer_count(&self) -> usize {
        self.variables
            .iter_variables_with_def()
            .filter(|(_, def)| def.is_integer())
            .count()
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name() == Some(name))
    }
}

impl fmt::Debug for LinearProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearProgram")
            .field("variables", &self.variables.len())
            .field("constraints", &self.constraints.len())
            .field("objective", &self.objective)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{Solution, variable};
    use std::collections::HashMap;

    #[test]
    fn collects_named_constraints_and_objective() {
        let mut program = LinearProgram::new();
        let a = program.add_variable(variable().binary().name("a"));
        let b = program.add_variable(variable().min(0.0).name("b"));
        program.add_constraint("cover", (a + b).geq(1.0));
        program.set_objective(2.0 * b);

        assert_eq!(program.handles(), vec![a, b]);
        assert_eq!(program.integer_count(), 1);
        assert!(program.constraint("cover").is_some());
        assert!(program.constraint("missing").is_none());

        let values: HashMap<Variable, f64> = [(a, 0.0), (b, 1.5)].into_iter().collect();
        assert_eq!(values.eval(program.objective()), 3.0);
    }
}
