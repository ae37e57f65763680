use crate::actions::Action;
use crate::Cost;
use std::io::{self, Write};

/// One step of a plan, annotated with the heuristic and evaluation values of
/// the search node it led to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PlanStep {
    pub action: Action,
    pub h: Cost,
    pub f: Cost,
}

/// A solution plan with its summary statistics.
#[derive(Clone, Debug)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    /// Recharges executed along the plan, read from the final state counter.
    pub total_recharges: u32,
    /// Energy spent by the whole plan: the g-value of the solution node.
    pub total_energy: Cost,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Writes the solution file: two summary lines, then one action per
    /// line.
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Solution length: {}", self.len())?;
        writeln!(out, "Total recharges uses: {}", self.total_recharges)?;
        for step in &self.steps {
            writeln!(out, "{} h={}, f={}", step.action, step.h, step.f)?;
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        self.write(&mut buf).expect("writing to a vec cannot fail");
        String::from_utf8(buf).expect("plans are plain ascii")
    }
}
