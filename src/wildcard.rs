//! Host-style name-in-expression matching for directory enumeration.
//!
//! Besides `*` and `?`, the host passes the DOS wildcard forms it derives
//! from legacy patterns: `<` (DOS star), `>` (DOS question mark) and `"`
//! (DOS dot). Matching is case-insensitive.

const ANY_RUN: char = '*';
const ANY_ONE: char = '?';
const DOS_STAR: char = '<';
const DOS_QM: char = '>';
const DOS_DOT: char = '"';

/// Match `name` against `pattern`. An empty pattern matches everything.
pub fn is_name_in_expression(pattern: &str, name: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }

    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();

    if !has_wildcards_in(&pattern) {
        return pattern == name;
    }

    let plen = pattern.len();
    let nlen = name.len();
    // DOS star may not consume the final dot, nor anything after it.
    let star_limit = name.iter().rposition(|c| *c == '.').unwrap_or(nlen);

    // matched[i][j]: pattern[i..] matches name[j..]
    let mut matched = vec![vec![false; nlen + 1]; plen + 1];
    matched[plen][nlen] = true;

    for i in (0..plen).rev() {
        for j in (0..=nlen).rev() {
            let here = name.get(j).copied();
            matched[i][j] = match pattern[i] {
                ANY_RUN => matched[i + 1][j] || (here.is_some() && matched[i][j + 1]),
                ANY_ONE => here.is_some() && matched[i + 1][j + 1],
                DOS_STAR => matched[i + 1][j] || (j < star_limit && matched[i][j + 1]),
                DOS_QM => match here {
                    Some('.') | None => matched[i + 1][j],
                    Some(_) => matched[i + 1][j + 1],
                },
                DOS_DOT => match here {
                    Some('.') => matched[i + 1][j + 1],
                    None => matched[i + 1][j],
                    Some(_) => false,
                },
                literal => here == Some(literal) && matched[i + 1][j + 1],
            };
        }
    }

    matched[0][0]
}

fn has_wildcards_in(pattern: &[char]) -> bool {
    pattern
        .iter()
        .any(|c| matches!(*c, ANY_RUN | ANY_ONE | DOS_STAR | DOS_QM | DOS_DOT))
}
