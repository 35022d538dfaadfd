//! Parser for the kernel's CPU list notation, as found in `cpuset.cpus`.

use std::num::ParseIntError;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid cpu id `{value}` in cpu list: {source}")]
    InvalidCpu {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid cpu range `{0}` in cpu list")]
    InvalidRange(String),
}

/// Expands a CPU list such as `0,2-4,9` into `["0", "2", "3", "4", "9"]`.
///
/// Items keep their input order and ranges are inclusive. An empty list yields an empty result.
///
/// # Errors
///
/// Returns [`ParseError::InvalidCpu`] if an id is not a non-negative integer and
/// [`ParseError::InvalidRange`] if a range is descending or has more than two bounds.
pub fn parse_cpu_list(cpulist: &str) -> Result<Vec<String>, ParseError> {
    let cpulist = cpulist.trim();
    if cpulist.is_empty() {
        return Ok(Vec::new());
    }

    let mut cpus = Vec::new();
    for item in cpulist.split(',') {
        let bounds = item
            .split('-')
            .map(|bound| {
                let bound = bound.trim();
                bound.parse::<u32>().map_err(|source| ParseError::InvalidCpu {
                    value: bound.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<u32>, ParseError>>()?;

        match *bounds.as_slice() {
            [cpu] => cpus.push(cpu.to_string()),
            [start, end] if start <= end => cpus.extend((start..=end).map(|cpu| cpu.to_string())),
            _ => return Err(ParseError::InvalidRange(item.to_owned())),
        }
    }

    Ok(cpus)
}
