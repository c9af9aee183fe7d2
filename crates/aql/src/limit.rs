//! LIMIT / OFFSET bounds and the fetch and offset request parameters

use crate::config::{CompilerConfig, FetchPrecedence};
use aql_ast::AqlQuery;
use aql_diagnostics::{AqlError, Result, AQL0107, AQL0108};

/// Applies the configured limit bounds and request paging to a query
pub struct LimitProcessor<'a> {
    config: &'a CompilerConfig,
}

impl<'a> LimitProcessor<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    /// Replace LIMIT and OFFSET of the query by their effective values
    pub fn apply(&self, query: &mut AqlQuery, fetch: Option<i64>, offset: Option<i64>) -> Result<()> {
        for (name, value) in [("fetch", fetch), ("offset", offset)] {
            if let Some(v) = value.filter(|v| *v < 0) {
                return Err(AqlError::semantic(
                    AQL0108,
                    format!("Query parameter {name} must not be negative: {v}"),
                ));
            }
        }
        if let (Some(limit), Some(max)) = (query.limit, self.config.max_limit) {
            if limit > max {
                return Err(AqlError::semantic(
                    AQL0107,
                    format!("Query LIMIT {limit} exceeds maximum limit {max}"),
                ));
            }
        }
        if let (Some(fetch), Some(max)) = (fetch, self.config.max_fetch) {
            if fetch > max {
                return Err(AqlError::semantic(
                    AQL0107,
                    format!("Fetch parameter {fetch} exceeds maximum fetch {max}"),
                ));
            }
        }

        let limit = self.effective_limit(query, fetch, offset)?;
        query.limit = limit.or(self.config.default_limit);
        query.offset = offset.or(query.offset);
        log::debug!(
            "Effective LIMIT {:?} OFFSET {:?}",
            query.limit,
            query.offset
        );
        Ok(())
    }

    fn effective_limit(&self, query: &AqlQuery, fetch: Option<i64>, offset: Option<i64>) -> Result<Option<i64>> {
        let precedence = self.config.fetch_precedence;
        let Some(fetch) = fetch else {
            if offset.is_some() {
                return Err(AqlError::semantic(
                    AQL0108,
                    "Query parameter for offset provided, but no fetch parameter",
                ));
            }
            return Ok(query.limit);
        };
        let Some(limit) = query.limit else {
            return Ok(Some(fetch));
        };
        match precedence {
            FetchPrecedence::Reject => Err(AqlError::semantic(
                AQL0108,
                format!(
                    "Query contains a LIMIT clause, fetch and offset parameters must not be used (with fetch precedence {precedence})"
                ),
            )),
            FetchPrecedence::MinFetch if query.offset.is_some() => Err(AqlError::semantic(
                AQL0108,
                format!(
                    "Query contains a OFFSET clause, fetch parameter must not be used (with fetch precedence {precedence})"
                ),
            )),
            FetchPrecedence::MinFetch => Ok(Some(limit.min(fetch))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aql_ast::{Containment, SelectClause};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn query(limit: Option<i64>, offset: Option<i64>) -> AqlQuery {
        let mut query = AqlQuery::new(SelectClause::default(), Containment::class("EHR", Some("e")));
        query.limit = limit;
        query.offset = offset;
        query
    }

    fn apply(
        config: &CompilerConfig,
        limit: Option<i64>,
        offset: Option<i64>,
        fetch: Option<i64>,
        offset_param: Option<i64>,
    ) -> Result<(Option<i64>, Option<i64>)> {
        let mut q = query(limit, offset);
        LimitProcessor::new(config).apply(&mut q, fetch, offset_param)?;
        Ok((q.limit, q.offset))
    }

    #[rstest]
    #[case(None, None, None, None, (None, None))]
    #[case(Some(10), Some(5), None, None, (Some(10), Some(5)))]
    #[case(None, None, Some(20), None, (Some(20), None))]
    #[case(None, None, Some(20), Some(40), (Some(20), Some(40)))]
    fn test_without_bounds(
        #[case] limit: Option<i64>,
        #[case] offset: Option<i64>,
        #[case] fetch: Option<i64>,
        #[case] offset_param: Option<i64>,
        #[case] expected: (Option<i64>, Option<i64>),
    ) {
        let config = CompilerConfig::default();
        assert_eq!(apply(&config, limit, offset, fetch, offset_param).unwrap(), expected);
    }

    #[test]
    fn test_default_limit() {
        let config = CompilerConfig::default().with_default_limit(100);
        assert_eq!(apply(&config, None, None, None, None).unwrap(), (Some(100), None));
        assert_eq!(apply(&config, Some(5), None, None, None).unwrap(), (Some(5), None));
        assert_eq!(apply(&config, None, None, Some(7), None).unwrap(), (Some(7), None));
    }

    #[test]
    fn test_max_limit_and_fetch() {
        let config = CompilerConfig::default().with_max_limit(50).with_max_fetch(20);

        let err = apply(&config, Some(51), None, None, None).unwrap_err();
        assert_eq!(err.code(), AQL0107);
        assert_eq!(err.message(), "Query LIMIT 51 exceeds maximum limit 50");

        let err = apply(&config, None, None, Some(21), None).unwrap_err();
        assert_eq!(err.message(), "Fetch parameter 21 exceeds maximum fetch 20");

        assert_eq!(apply(&config, Some(50), None, None, None).unwrap(), (Some(50), None));
    }

    #[test]
    fn test_offset_requires_fetch() {
        let err = apply(&CompilerConfig::default(), None, None, None, Some(10)).unwrap_err();
        assert_eq!(err.code(), AQL0108);
        assert_eq!(
            err.message(),
            "Query parameter for offset provided, but no fetch parameter"
        );
    }

    #[test]
    fn test_reject_precedence() {
        let err = apply(&CompilerConfig::default(), Some(10), None, Some(5), None).unwrap_err();
        assert_eq!(
            err.message(),
            "Query contains a LIMIT clause, fetch and offset parameters must not be used (with fetch precedence REJECT)"
        );
    }

    #[test]
    fn test_min_fetch_precedence() {
        let config = CompilerConfig::default().with_fetch_precedence(FetchPrecedence::MinFetch);
        assert_eq!(apply(&config, Some(10), None, Some(5), None).unwrap(), (Some(5), None));
        assert_eq!(apply(&config, Some(10), None, Some(50), Some(3)).unwrap(), (Some(10), Some(3)));

        let err = apply(&config, Some(10), Some(2), Some(5), None).unwrap_err();
        assert_eq!(
            err.message(),
            "Query contains a OFFSET clause, fetch parameter must not be used (with fetch precedence MIN_FETCH)"
        );
    }

    #[test]
    fn test_negative_parameters() {
        let err = apply(&CompilerConfig::default(), None, None, Some(-1), None).unwrap_err();
        assert_eq!(err.code(), AQL0108);
    }

    proptest! {
        #[test]
        fn test_min_fetch_never_exceeds_either(limit in 0i64..10_000, fetch in 0i64..10_000) {
            let config = CompilerConfig::default().with_fetch_precedence(FetchPrecedence::MinFetch);
            let (effective, _) = apply(&config, Some(limit), None, Some(fetch), None).unwrap();
            prop_assert_eq!(effective, Some(limit.min(fetch)));
        }
    }
}
