//! Concurrent groups and fixed-width batches of unit dispatches.
//!
//! `run_group` runs a set of units concurrently and returns their results
//! in submission order, with a panic inside any one unit captured as that
//! unit's result. `run_batches` runs groups of at most `width` units one
//! after another; a panic that escapes a whole group drops that batch.

use crate::result::UnitResult;
use futures::future::join_all;
use futures::FutureExt;
use gridstats_core::{EntityType, ParamValue, Params, Requirements, Scalar, SplitUnit, Tag};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{error, info};

/// A unit whose future panicked instead of producing a result.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("task panicked: {0}")]
pub struct TaskPanic(pub String);

/// A unit's result, or the panic that replaced it.
pub type Settled = Result<UnitResult, TaskPanic>;

/// One settled unit paired with its grouping key.
#[derive(Debug, Clone)]
pub struct TaggedResult {
    pub tag: Tag,
    pub result: Settled,
}

/// Run every unit concurrently. Results keep submission order.
///
/// `dispatch` is called for each unit while the group is assembled; a panic
/// there escapes the group. A panic while a unit's future runs is captured
/// as that unit's `TaskPanic`.
pub async fn run_group<F, Fut>(units: Vec<SplitUnit>, dispatch: &F) -> Vec<TaggedResult>
where
    F: Fn(Requirements) -> Fut,
    Fut: Future<Output = UnitResult>,
{
    let tasks: Vec<_> = units
        .into_iter()
        .map(|unit| {
            let fut = dispatch(unit.requirements);
            let tag = unit.tag;
            async move {
                let result = AssertUnwindSafe(fut)
                    .catch_unwind()
                    .await
                    .map_err(|payload| TaskPanic(panic_message(payload)));
                TaggedResult { tag, result }
            }
        })
        .collect();

    join_all(tasks).await
}

/// Per-entity units for a multi-entity request.
#[derive(Debug, Clone)]
pub struct EntityFanOut {
    pub entity_type: EntityType,
    pub entities: Vec<Scalar>,
    pub units: Vec<SplitUnit>,
}

/// Expand a `driver` (or else `constructor`) list into one unit per entity.
///
/// A `driver` list wins even when empty. `None` when no non-empty entity
/// list is present.
pub fn entity_units(requirements: &Requirements) -> Option<EntityFanOut> {
    let (entity_type, entities) = [EntityType::Driver, EntityType::Constructor]
        .into_iter()
        .find_map(|kind| {
            requirements
                .get(kind.as_str())
                .and_then(ParamValue::as_list)
                .map(|list| (kind, list.to_vec()))
        })?;
    if entities.is_empty() {
        return None;
    }

    let key = entity_type.as_str();
    let base: Params = requirements
        .params
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let units = entities
        .iter()
        .map(|entity| {
            let mut params = base.clone();
            params.insert(key.to_string(), ParamValue::Scalar(entity.clone()));
            SplitUnit {
                requirements: Requirements::with_params(requirements.endpoint.clone(), params),
                tag: Tag::Entity {
                    kind: entity_type,
                    value: entity.to_string(),
                },
            }
        })
        .collect();

    Some(EntityFanOut {
        entity_type,
        entities,
        units,
    })
}

/// Results of a batched run.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Settled units of every batch that completed, in entity order.
    pub results: Vec<TaggedResult>,
    /// One message per dropped batch, when reporting is enabled.
    pub dropped: Vec<String>,
    pub total_batches: usize,
}

/// Run `units` in consecutive batches of at most `width`, each batch fully
/// resolved before the next starts.
pub async fn run_batches<F, Fut>(
    units: Vec<SplitUnit>,
    width: usize,
    report_dropped: bool,
    dispatch: &F,
) -> BatchOutcome
where
    F: Fn(Requirements) -> Fut,
    Fut: Future<Output = UnitResult>,
{
    let width = width.max(1);
    let mut outcome = BatchOutcome {
        total_batches: units.len().div_ceil(width),
        ..BatchOutcome::default()
    };

    for (index, batch) in units.chunks(width).enumerate() {
        let number = index + 1;
        info!(batch = number, of = outcome.total_batches, size = batch.len(), "running batch");

        match AssertUnwindSafe(run_group(batch.to_vec(), dispatch))
            .catch_unwind()
            .await
        {
            Ok(results) => outcome.results.extend(results),
            Err(payload) => {
                let message = panic_message(payload);
                error!(batch = number, error = %message, "batch failed, dropping its results");
                if report_dropped {
                    outcome.dropped.push(format!("batch {number}: {message}"));
                }
            }
        }
    }

    outcome
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{UnitMetadata, UnitResult};
    use polars::df;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn year_units(years: &[i32]) -> Vec<SplitUnit> {
        years
            .iter()
            .map(|&y| SplitUnit {
                requirements: Requirements::new("RESULTS.race").param("year", y),
                tag: Tag::Year(y),
            })
            .collect()
    }

    fn ok_unit() -> UnitResult {
        UnitResult::success(df!("position" => &["1"]).unwrap(), UnitMetadata::now())
    }

    fn year_of(req: &Requirements) -> i64 {
        match req.get("year") {
            Some(ParamValue::Scalar(Scalar::Int(y))) => *y,
            other => panic!("unexpected year {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn group_keeps_submission_order() {
        // earlier years finish last
        let dispatch = |req: Requirements| async move {
            let delay = 2030 - year_of(&req);
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            ok_unit()
        };
        let results = run_group(year_units(&[2019, 2020, 2021]), &dispatch).await;

        let tags: Vec<Tag> = results.iter().map(|r| r.tag.clone()).collect();
        assert_eq!(tags, vec![Tag::Year(2019), Tag::Year(2020), Tag::Year(2021)]);
    }

    #[tokio::test]
    async fn panicking_unit_does_not_abort_siblings() {
        let dispatch = |req: Requirements| async move {
            if year_of(&req) == 2020 {
                panic!("decoder blew up");
            }
            ok_unit()
        };
        let results = run_group(year_units(&[2019, 2020, 2021]), &dispatch).await;

        assert!(results[0].result.is_ok());
        assert_eq!(
            results[1].result.as_ref().unwrap_err(),
            &TaskPanic("decoder blew up".into())
        );
        assert!(results[2].result.is_ok());
    }

    #[test]
    fn fans_out_driver_list() {
        let req = Requirements::new("RESULTS.race")
            .param("year", 2023)
            .param("driver", ParamValue::list(["max_verstappen", "lewis_hamilton"]));
        let fan = entity_units(&req).unwrap();

        assert_eq!(fan.entity_type, EntityType::Driver);
        assert_eq!(fan.units.len(), 2);
        assert_eq!(
            fan.units[1].requirements.get("driver"),
            Some(&ParamValue::from("lewis_hamilton"))
        );
        assert_eq!(fan.units[1].requirements.get("year"), Some(&ParamValue::from(2023)));
        assert_eq!(
            fan.units[0].tag,
            Tag::Entity {
                kind: EntityType::Driver,
                value: "max_verstappen".into()
            }
        );
    }

    #[test]
    fn constructor_list_when_no_driver_list() {
        let req = Requirements::new("RESULTS.race")
            .param("driver", "alonso")
            .param("constructor", ParamValue::list(["ferrari", "mclaren", "williams"]));
        let fan = entity_units(&req).unwrap();
        assert_eq!(fan.entity_type, EntityType::Constructor);
        assert_eq!(fan.units.len(), 3);
        assert_eq!(
            fan.units[2].requirements.get("driver"),
            Some(&ParamValue::from("alonso"))
        );
    }

    #[test]
    fn empty_or_absent_entity_list() {
        let empty = Requirements::new("RESULTS.race")
            .param("driver", ParamValue::List(vec![]))
            .param("constructor", ParamValue::list(["ferrari"]));
        assert!(entity_units(&empty).is_none());
        assert!(entity_units(&Requirements::new("RESULTS.race").param("year", 2023)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn batches_run_sequentially_within_width() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let dispatch = |_req: Requirements| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                ok_unit()
            }
        };

        let units = year_units(&[2015, 2016, 2017, 2018, 2019, 2020, 2021, 2022, 2023, 2024]);
        let outcome = run_batches(units, 4, false, &dispatch).await;

        assert_eq!(outcome.total_batches, 3);
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 4);
        assert_eq!(outcome.results[9].tag, Tag::Year(2024));
    }

    #[tokio::test]
    async fn panic_outside_units_drops_the_batch() {
        // panics while the group is assembled, not inside a unit
        let dispatch = |req: Requirements| {
            if year_of(&req) == 2017 {
                panic!("bad request record");
            }
            async move { ok_unit() }
        };
        let units = year_units(&[2015, 2016, 2017, 2018, 2019]);

        let silent = run_batches(units.clone(), 2, false, &dispatch).await;
        let years: Vec<Tag> = silent.results.iter().map(|r| r.tag.clone()).collect();
        assert_eq!(years, vec![Tag::Year(2015), Tag::Year(2016), Tag::Year(2019)]);
        assert!(silent.dropped.is_empty());

        let reported = run_batches(units, 2, true, &dispatch).await;
        assert_eq!(reported.dropped, vec!["batch 2: bad request record".to_string()]);
    }
}
