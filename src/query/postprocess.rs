//! Result operators that run on the client after the statement returns.
use crate::error::SheetQueryError;
use crate::query::translate::Deferred;
use crate::query::translate::Terminal;
use crate::query::SequenceError;

/// Applies the deferred operators to a materialized sequence: reverse, then skip, then take.
pub(crate) fn apply<T>(mut items: Vec<T>, deferred: &Deferred) -> Vec<T> {
    if deferred.reverse {
        items.reverse();
    }
    let items = items.into_iter().skip(deferred.skip);
    match deferred.take {
        Some(count) => items.take(count).collect(),
        None => items.collect(),
    }
}

/// Resolves an element operator by consuming as much of the sequence as it needs.
///
/// Returns `None` for an empty sequence when the operator has a default.
pub(crate) fn element<T, I>(mut items: I, terminal: Terminal) -> Result<Option<T>, SheetQueryError>
where
    I: Iterator<Item = Result<T, SheetQueryError>>,
{
    let (item, or_default) = match terminal {
        Terminal::First { or_default } => (items.next().transpose()?, or_default),
        Terminal::Last { or_default } => {
            let mut last = None;
            for item in items {
                last = Some(item?);
            }
            (last, or_default)
        }
        Terminal::Single { or_default } => {
            let first = items.next().transpose()?;
            if first.is_some() && items.next().transpose()?.is_some() {
                Err(SequenceError::MoreThanOne)?
            }
            (first, or_default)
        }
    };
    if item.is_none() && !or_default {
        Err(SequenceError::NoElements)?
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(items: &[i32]) -> impl Iterator<Item = Result<i32, SheetQueryError>> + '_ {
        items.iter().map(|item| Ok(*item))
    }

    #[test]
    fn reverse_then_skip() {
        let deferred = Deferred {
            reverse: true,
            skip: 2,
            take: None,
        };
        assert_eq!(apply(vec![1, 2, 3, 4, 5], &deferred), vec![3, 2, 1]);
        let deferred = Deferred {
            reverse: false,
            skip: 1,
            take: Some(2),
        };
        assert_eq!(apply(vec![1, 2, 3, 4, 5], &deferred), vec![2, 3]);
    }

    #[test]
    fn element_operators() {
        assert_eq!(element(ok(&[1, 2]), Terminal::First { or_default: false }).unwrap(), Some(1));
        assert_eq!(element(ok(&[1, 2]), Terminal::Last { or_default: false }).unwrap(), Some(2));
        assert_eq!(element(ok(&[7]), Terminal::Single { or_default: false }).unwrap(), Some(7));
        assert_eq!(element(ok(&[]), Terminal::Last { or_default: true }).unwrap(), None);
        assert!(matches!(
            element(ok(&[]), Terminal::First { or_default: false }),
            Err(SheetQueryError::SequenceError(SequenceError::NoElements))
        ));
        assert!(matches!(
            element(ok(&[1, 2]), Terminal::Single { or_default: true }),
            Err(SheetQueryError::SequenceError(SequenceError::MoreThanOne))
        ));
    }
}
