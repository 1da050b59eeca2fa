//! Case-insensitive fuzzy ranking for account, owner and category pickers.

const SCORE_MATCH: i64 = 16;
const BONUS_CONSECUTIVE: i64 = 8;
const BONUS_BOUNDARY: i64 = 8;
const PENALTY_GAP_START: i64 = 3;
const PENALTY_GAP_EXTENSION: i64 = 1;

const BONUS_AT_START: i64 = 1000;
const BONUS_EARLY: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hit {
    score: i64,
    start: usize,
}

fn is_boundary(chars: &[char], idx: usize) -> bool {
    idx == 0 || !chars[idx - 1].is_alphanumeric()
}

/// Greedy forward subsequence match beginning at `start`.
fn score_from(text: &[char], pattern: &[char], start: usize) -> Option<i64> {
    let mut score = 0i64;
    let mut pi = 0usize;
    let mut last: Option<usize> = None;
    for (ti, c) in text.iter().enumerate().skip(start) {
        if pi == pattern.len() {
            break;
        }
        if *c != pattern[pi] {
            continue;
        }
        score += SCORE_MATCH;
        if is_boundary(text, ti) {
            score += BONUS_BOUNDARY;
        }
        match last {
            Some(prev) if prev + 1 == ti => score += BONUS_CONSECUTIVE,
            Some(prev) => {
                let gap = (ti - prev - 1) as i64;
                score -= PENALTY_GAP_START + (gap - 1) * PENALTY_GAP_EXTENSION;
            }
            None => {}
        }
        last = Some(ti);
        pi += 1;
    }
    (pi == pattern.len()).then_some(score)
}

fn best_hit(text: &str, pattern: &[char]) -> Option<Hit> {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let first = *pattern.first()?;
    text.iter()
        .enumerate()
        .filter(|(_, c)| **c == first)
        .filter_map(|(start, _)| score_from(&text, pattern, start).map(|score| Hit { score, start }))
        .max_by(|a, b| a.score.cmp(&b.score).then(b.start.cmp(&a.start)))
}

/// Rank `candidates` against `query`, dropping non-matches.
///
/// Matches at the very start of a candidate rank first, then earlier matches.
/// Ties go to the shorter candidate, then to lower-cased alphabetical order.
/// An empty query returns the candidates unchanged.
pub fn fuzzy_match(query: &str, candidates: &[String]) -> Vec<String> {
    if query.is_empty() {
        return candidates.to_vec();
    }
    let pattern: Vec<char> = query.to_lowercase().chars().collect();

    let mut scored: Vec<(&String, i64)> = candidates
        .iter()
        .filter_map(|item| {
            let hit = best_hit(item, &pattern)?;
            if hit.score <= 0 {
                return None;
            }
            let boost = if hit.start == 0 {
                BONUS_AT_START
            } else {
                BONUS_EARLY - hit.start as i64
            };
            Some((item, hit.score + boost))
        })
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.cmp(sa)
            .then(a.chars().count().cmp(&b.chars().count()))
            .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
    });
    scored.into_iter().map(|(item, _)| item.clone()).collect()
}
