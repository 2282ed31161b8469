//! Text formats of instances and schedules.
//!
//! Instances look like
//! ```text
//! Number of tests : 3
//! Number of machines : 2
//! Number of resources : 1
//! test( 't1', 4, [], ['r1'])
//! test( 't2', 3, ['m2'], [])
//! test( 't3', 2, [], ['r1'])
//! ```
//! Declaration lines that don't parse are skipped. Other lines are ignored.

mod run;

pub use run::*;

use crate::core::{Instance, InstanceError, Schedule, Test};
use std::fmt::Write;
use std::io::BufRead;
use thiserror::Error;
use tracing::warn;

/// Errors of reading an instance.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: expected `Number of {expected} : N`")]
    MalformedHeader { line: usize, expected: &'static str },
    #[error("line {line}: malformed test declaration: {reason}")]
    MalformedTestLine { line: usize, reason: String },
    #[error("header announces {expected} tests but {found} were declared")]
    MissingTests { expected: usize, found: usize },
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const HEADERS: [&str; 3] = ["tests", "machines", "resources"];

/// Reads an instance from text.
///
/// # Errors
/// - If a header line is missing or malformed.
/// - If fewer tests are declared than the header announces.
/// - If reading fails.
pub fn deserialize(reader: &mut impl BufRead) -> Result<Instance, ParseError> {
    let mut lines = reader.lines().enumerate().map(|(i, line)| (i + 1, line));

    let mut counts = [0; 3];
    for (count, expected) in counts.iter_mut().zip(HEADERS) {
        let (number, line) = loop {
            match lines.next() {
                Some((number, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break (number, line);
                    }
                }
                None => return Err(ParseError::MalformedHeader { line: 0, expected }),
            }
        };
        *count = parse_header(&line, expected)
            .ok_or(ParseError::MalformedHeader { line: number, expected })?;
    }
    let [num_tests, num_machines, num_resources] = counts;

    let mut tests = Vec::with_capacity(num_tests);
    for (number, line) in lines {
        let line = line?;
        if !line.trim_start().starts_with("test") {
            continue;
        }
        if tests.len() == num_tests {
            warn!(line = number, "Ignoring test declared beyond the header count");
            continue;
        }
        match parse_test_line(&line, num_machines, num_resources) {
            Ok(test) => tests.push(test),
            Err(reason) => {
                let err = ParseError::MalformedTestLine { line: number, reason };
                warn!("Skipping {err}");
            }
        }
    }

    if tests.len() < num_tests {
        return Err(ParseError::MissingTests {
            expected: num_tests,
            found: tests.len(),
        });
    }

    Ok(Instance::from_tests(num_machines, num_resources, tests)?)
}

/// Reads an instance from a string. See [`deserialize`].
///
/// # Errors
/// - See [`deserialize`].
pub fn from_str(text: &str) -> Result<Instance, ParseError> {
    deserialize(&mut text.as_bytes())
}

/// Parses `Number of <label> : N`, label compared case-insensitively.
fn parse_header(line: &str, label: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if !name.eq_ignore_ascii_case(&format!("number of {label}")) {
        return None;
    }
    value.trim().parse().ok()
}

/// Parses `test(<name>, <duration>, [<machines>], [<resources>])`.
fn parse_test_line(line: &str, machines: usize, resources: usize) -> Result<Test, String> {
    let body = line.trim().trim_end_matches('.').trim_end();
    let body = body
        .strip_prefix("test")
        .map(str::trim_start)
        .and_then(|b| b.strip_prefix('('))
        .and_then(|b| b.strip_suffix(')'))
        .ok_or_else(|| "expected `test( ... )`".to_owned())?;

    let (name, rest) = body.split_once(',').ok_or_else(|| "missing duration".to_owned())?;
    let name = unquote(name);
    if name.is_empty() {
        return Err("empty test name".into());
    }

    let (duration, rest) = rest.split_once(',').ok_or_else(|| "missing machine list".to_owned())?;
    let duration: u64 = duration
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration `{}`", duration.trim()))?;
    if duration == 0 {
        return Err("zero duration".into());
    }

    let (machine_list, rest) = bracketed(rest)?;
    let rest = rest
        .trim_start()
        .strip_prefix(',')
        .ok_or_else(|| "missing resource list".to_owned())?;
    let (resource_list, rest) = bracketed(rest)?;
    if !rest.trim().is_empty() {
        return Err(format!("unexpected `{}`", rest.trim()));
    }

    Ok(Test {
        name: name.to_owned(),
        duration,
        machines: references(machine_list, 'm', "machine", machines)?,
        resources: references(resource_list, 'r', "resource", resources)?,
    })
}

fn unquote(token: &str) -> &str {
    token.trim().trim_matches(|c: char| c == '\'' || c == '"')
}

/// Splits `[inner] rest` into `inner` and `rest`.
fn bracketed(text: &str) -> Result<(&str, &str), String> {
    text.trim_start()
        .strip_prefix('[')
        .and_then(|t| t.split_once(']'))
        .ok_or_else(|| "expected a bracketed list".to_owned())
}

/// Parses 1-based references such as `'m3'` into sorted 0-based indices.
/// Every reference must carry the `prefix` of its list.
fn references(list: &str, prefix: char, kind: &str, count: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for token in list.split(',').map(unquote).filter(|t| !t.is_empty()) {
        let index: usize = token
            .strip_prefix(prefix)
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| format!("invalid {kind} reference `{token}`"))?;
        if index == 0 || index > count {
            return Err(format!("{kind} reference `{token}` out of range 1..={count}"));
        }
        indices.push(index - 1);
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

/// Writes an instance in the input format.
/// Tests capable on every machine are written with an empty machine list.
#[must_use]
pub fn to_string(instance: &Instance) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Number of tests : {}", instance.num_tests());
    let _ = writeln!(out, "Number of machines : {}", instance.num_machines);
    let _ = writeln!(out, "Number of resources : {}", instance.num_resources);

    for test in 0..instance.num_tests() {
        let machines: Vec<_> = instance.machines_of(test).collect();
        let machines = if machines.len() == instance.num_machines {
            String::new()
        } else {
            quoted_list('m', machines)
        };
        let resources = quoted_list('r', instance.resources_of(test));
        let _ = writeln!(
            out,
            "test( '{}', {}, [{machines}], [{resources}])",
            instance.names[test], instance.durations[test]
        );
    }

    out
}

fn quoted_list(prefix: char, indices: impl IntoIterator<Item = usize>) -> String {
    let items: Vec<_> = indices.into_iter().map(|i| format!("'{prefix}{}'", i + 1)).collect();
    items.join(",")
}

/// Renders a schedule: a makespan comment followed by one line per machine,
/// tests in ascending start order with the resources they hold.
#[must_use]
pub fn format_schedule(instance: &Instance, makespan: u64, schedule: &Schedule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "% Makespan: {makespan}");

    for machine in 0..instance.num_machines {
        let tests = schedule.machine_tests(machine);
        let _ = write!(out, "machine('m{}', {}", machine + 1, tests.len());
        if !tests.is_empty() {
            let entries: Vec<_> = tests
                .iter()
                .map(|&t| {
                    let resources = instance.resources_of(t).map(|r| format!(",'r{}'", r + 1));
                    let resources: String = resources.collect();
                    format!("('{}',{}{resources})", instance.names[t], schedule.test_start[t])
                })
                .collect();
            let _ = write!(out, ", [{}]", entries.join(", "));
        }
        let _ = writeln!(out, ")");
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "Number of tests : 3
number  of Machines: 2
NUMBER OF RESOURCES : 2

test( 't1', 4, [], ['r1'])
% a comment
test( 't2', 3, ['m2'], [])
test( 't3', 2, ['m1', 'm2'], ['r1','r2']).
";

    #[test]
    fn parses_sample() -> anyhow::Result<()> {
        let instance = from_str(SAMPLE)?;

        assert_eq!(instance.num_tests(), 3);
        assert_eq!(instance.num_machines, 2);
        assert_eq!(instance.num_resources, 2);
        assert_eq!(instance.names, vec!["t1", "t2", "t3"]);
        assert_eq!(instance.durations, vec![4, 3, 2]);
        assert_eq!(instance.capability, vec![vec![true, false, true], vec![true, true, true]]);
        assert_eq!(instance.resource_use, vec![vec![true, false, true], vec![false, false, true]]);
        Ok(())
    }

    #[test]
    fn malformed_test_lines_are_skipped() -> anyhow::Result<()> {
        let text = "Number of tests : 2
Number of machines : 1
Number of resources : 1
test( 't1', x, [], [])
test( 't2', 2, ['m4'], [])
test( 't3', 2, [], ['r1'])
test( 't4', 1, [], [])
test( 't5', 1, [], [])
";
        let instance = from_str(text)?;

        assert_eq!(instance.names, vec!["t3", "t4"]);
        Ok(())
    }

    #[test]
    fn header_errors_are_fatal() {
        let missing = from_str("Number of tests : 2\nNumber of machines : 1\n");
        assert!(matches!(
            missing,
            Err(ParseError::MalformedHeader { expected: "resources", .. })
        ));

        let swapped = from_str("Number of machines : 1\nNumber of tests : 2\n");
        assert!(matches!(
            swapped,
            Err(ParseError::MalformedHeader { line: 1, expected: "tests" })
        ));

        let garbage = from_str("Number of tests : two\n");
        assert!(matches!(garbage, Err(ParseError::MalformedHeader { .. })));
    }

    #[test]
    fn missing_declarations_are_fatal() {
        let text = "Number of tests : 2\nNumber of machines : 1\nNumber of resources : 0\ntest('t1', 1, [], [])\n";
        assert!(matches!(
            from_str(text),
            Err(ParseError::MissingTests { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn references_need_their_list_prefix() -> anyhow::Result<()> {
        let text = "Number of tests : 1
Number of machines : 1
Number of resources : 1
test( 't1', 2, ['r1'], ['m1'])
test( 't2', 2, ['m1'], ['r1'])
";
        let instance = from_str(text)?;
        assert_eq!(instance.names, vec!["t2"]);

        assert!(parse_test_line("test( 't1', 2, ['1'], [])", 1, 1).is_err());
        assert!(parse_test_line("test( 't1', 2, [], ['m1'])", 1, 1).is_err());
        Ok(())
    }

    #[test]
    fn overflowing_durations_are_rejected() {
        let text = "Number of tests : 2
Number of machines : 2
Number of resources : 0
test( 'a', 10000000000000000000, [], [])
test( 'b', 10000000000000000000, [], [])
";
        assert!(matches!(
            from_str(text),
            Err(ParseError::Instance(InstanceError::DurationOverflow))
        ));
    }

    #[test]
    fn written_instance_reads_back() -> anyhow::Result<()> {
        let instance = from_str(SAMPLE)?;
        let text = to_string(&instance);

        assert!(text.contains("test( 't1', 4, [], ['r1'])"));
        assert!(text.contains("test( 't3', 2, [], ['r1','r2'])"));
        assert_eq!(from_str(&text)?, instance);
        Ok(())
    }

    #[test]
    fn formats_schedule() -> anyhow::Result<()> {
        let text = "Number of tests : 2\nNumber of machines : 3\nNumber of resources : 1\n\
                    test('t1', 3, [], [])\ntest('t2', 2, [], ['r1'])\n";
        let instance = from_str(text)?;
        let schedule = Schedule::new(vec![0, 0], vec![0, 1]);

        let out = format_schedule(&instance, 3, &schedule);

        assert_eq!(
            out,
            "% Makespan: 3\n\
             machine('m1', 1, [('t1',0)])\n\
             machine('m2', 1, [('t2',0,'r1')])\n\
             machine('m3', 0)\n"
        );
        Ok(())
    }

    #[test]
    fn machine_lines_are_sorted_by_start() -> anyhow::Result<()> {
        let text = "Number of tests : 3\nNumber of machines : 1\nNumber of resources : 0\n\
                    test('a', 1, [], [])\ntest('b', 1, [], [])\ntest('c', 1, [], [])\n";
        let instance = from_str(text)?;
        let schedule = Schedule::new(vec![2, 0, 1], vec![0, 0, 0]);

        let out = format_schedule(&instance, 3, &schedule);

        assert!(out.ends_with("machine('m1', 3, [('b',0), ('c',1), ('a',2)])\n"));
        Ok(())
    }
}
