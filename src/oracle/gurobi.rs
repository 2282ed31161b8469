#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
use crate::core::{Assignment, Oracle, OracleInstance, OracleOutcome};
use anyhow::Result;
use grb::prelude::*;
use std::time::Duration;

/// Time-indexed ILP oracle.
/// Variable `x_{t}_{m}_{s}` is 1 when test `t` starts at `s` on machine `m`.
/// Its solve function panics if the Gurobi solver fails.
#[derive(Clone, Debug, Default)]
pub struct Gurobi;

impl Oracle for Gurobi {
    fn solve(&mut self, problem: &OracleInstance, bound: u64, timeout: Duration) -> OracleOutcome {
        gurobi_impl(problem, bound, timeout).unwrap_or_else(|err| panic!("Gurobi failed {err}"))
    }

    fn name(&self) -> &'static str {
        "Gurobi"
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::ORACLES)]
static INSTANCE: fn() -> Box<dyn Oracle> = || Box::new(Gurobi);

/// Start variable of a test on a machine at a time.
type Start = (usize, u64, Var);

fn create_model(timeout: Duration) -> Result<Model> {
    let mut env = Env::new("")?;
    env.set(param::OutputFlag, 0)?;
    env.set(param::LogToConsole, 0)?;
    env.set(param::TimeLimit, timeout.as_secs_f64())?;
    Ok(Model::with_env("makespan", env)?)
}

#[allow(clippy::useless_conversion)]
fn gurobi_impl(problem: &OracleInstance, bound: u64, timeout: Duration) -> Result<OracleOutcome> {
    let instance = &problem.instance;
    let durations = &instance.durations;

    if durations.iter().any(|&d| d > bound) {
        return Ok(OracleOutcome::Infeasible);
    }

    let mut model = create_model(timeout)?;
    let x = start_vars(&mut model, problem, bound)?;
    let makespan = add_intvar!(model, name: "makespan", bounds: 0u64..)?;

    for (t, xt) in x.iter().enumerate() {
        let expr = xt.iter().map(|&(_, _, var)| var).grb_sum();
        model.add_constr(&format!("once_{t}"), c!(expr == 1))?;
    }

    for u in 0..bound {
        for m in 0..instance.num_machines {
            let vars = running(&x, durations, u, |_, machine| machine == m);
            if vars.len() > 1 {
                let expr = vars.into_iter().grb_sum();
                model.add_constr(&format!("machine_{m}_{u}"), c!(expr <= 1))?;
            }
        }
        for (r, row) in instance.resource_use.iter().enumerate() {
            let vars = running(&x, durations, u, |t, _| row[t]);
            if vars.len() > 1 {
                let expr = vars.into_iter().grb_sum();
                model.add_constr(&format!("resource_{r}_{u}"), c!(expr <= 1))?;
            }
        }
    }

    for (t, xt) in x.iter().enumerate() {
        for &(m, s, var) in xt {
            let end = s + durations[t];
            model.add_constr(&format!("end_{t}_{m}_{s}"), c!(makespan >= end * var))?;
        }
    }

    model.set_objective(makespan, Minimize)?;
    model.optimize()?;

    let solutions = model.get_attr(attr::SolCount)?;
    match model.status()? {
        Status::Infeasible => return Ok(OracleOutcome::Infeasible),
        _ if solutions == 0 => return Ok(OracleOutcome::Timeout),
        _ => {}
    }

    let mut test_start = vec![0; x.len()];
    let mut test_machine = vec![0; x.len()];
    for (t, xt) in x.iter().enumerate() {
        for &(m, s, var) in xt {
            if model.get_obj_attr(attr::X, &var)? > 0.5 {
                test_start[t] = s;
                test_machine[t] = m;
            }
        }
    }

    let time = test_start.iter().zip(durations).map(|(s, d)| s + d).max().unwrap_or_default();
    Ok(OracleOutcome::Feasible(Assignment {
        time,
        test_start,
        test_machine,
    }))
}

fn start_vars(model: &mut Model, problem: &OracleInstance, bound: u64) -> Result<Vec<Vec<Start>>> {
    let durations = &problem.instance.durations;
    let mut x = Vec::with_capacity(durations.len());
    for (t, &duration) in durations.iter().enumerate() {
        let mut xt = Vec::new();
        for m in problem.candidate_machines(t) {
            for s in 0..=bound - duration {
                xt.push((m, s, add_binvar!(model, name: &format!("x_{t}_{m}_{s}"))?));
            }
        }
        x.push(xt);
    }
    Ok(x)
}

/// Start variables of the selected tests that run during time unit `u`.
fn running<F>(x: &[Vec<Start>], durations: &[u64], u: u64, select: F) -> Vec<Var>
where
    F: Fn(usize, usize) -> bool,
{
    let mut vars = Vec::new();
    for (t, xt) in x.iter().enumerate() {
        for &(m, s, var) in xt {
            if select(t, m) && s <= u && u < s + durations[t] {
                vars.push(var);
            }
        }
    }
    vars
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::samples;

    #[test]
    fn test_gurobi() {
        assert!(samples(&mut Gurobi).is_ok());
    }
}
