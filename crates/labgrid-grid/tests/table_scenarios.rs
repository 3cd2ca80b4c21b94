//! End-to-end table behaviour against the in-memory backend

use labgrid_cache::{LoadOutcome, SkipReason};
use labgrid_client::{endpoints, ClientError, OptionField, OptionRegistry};
use labgrid_grid::prelude::*;
use labgrid_grid::{
    AssignOutcome, CellState, FilterForm, HeaderState, Level, SampleForm, StatusIndicator, GENERIC_ERROR,
};
use labgrid_test_utils::{page, sample_row, FakeBackend, Op, Request};
use labgrid_types::{Cursor, ErrorPayload, FieldError, OptionItem, Page};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

fn context(backend: &Arc<FakeBackend>, config: GridConfig) -> GridContext {
    let mut registry = OptionRegistry::new();
    for field in OptionField::ALL {
        registry.register(field.column(), Arc::new(backend.option_source(field.query_key())));
    }
    GridContext::new(Arc::new(config), backend.clone(), backend.clone(), registry)
}

fn near_bottom() -> ScrollMetrics {
    ScrollMetrics::new(2_000.0, 1_600.0, 400.0)
}

fn far_from_bottom() -> ScrollMetrics {
    ScrollMetrics::new(10_000.0, 0.0, 400.0)
}

fn first_key(kind: TableKind, config: &GridConfig) -> String {
    kind.identity(config, &FilterSet::new(), &[]).key().to_string()
}

#[tokio::test]
async fn scrolling_loads_pages_until_last() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(
        &first_key(TableKind::Samples, &config),
        Page::new(vec![sample_row(1, 2020)], Some(Cursor::new("cursor2"))),
    );
    backend.add_page("cursor2", Page::new(vec![sample_row(2, 2021)], None));
    let table = context(&backend, config).table(TableKind::Samples);

    let view = table.load().await.unwrap();
    assert_eq!(view.row_ids(), vec![RowId(1)]);
    assert!(view.has_more);

    assert_eq!(table.on_scroll(far_from_bottom()).await.unwrap(), None);

    let outcome = table.on_scroll(near_bottom()).await.unwrap();
    assert_eq!(outcome, Some(LoadOutcome::Appended { rows: 1, has_more: false }));

    let view = table.view();
    assert_eq!(view.row_ids(), vec![RowId(1), RowId(2)]);
    assert!(!view.has_more);

    assert_eq!(table.on_scroll(near_bottom()).await.unwrap(), None);
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn mount_fills_a_short_viewport() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(&first_key(TableKind::Samples, &config), page(&[1, 2], Some("c2")));
    backend.add_page("c2", page(&[3], None));
    let table = context(&backend, config).table(TableKind::Samples);

    // two rows are far shorter than an 800px viewport
    let view = table.mount(ScrollMetrics::new(66.0, 0.0, 800.0)).await.unwrap();
    assert_eq!(view.row_ids(), vec![RowId(1), RowId(2), RowId(3)]);
}

#[tokio::test]
async fn no_second_fetch_while_one_is_in_flight() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(&first_key(TableKind::Samples, &config), page(&[1], Some("c2")));
    backend.add_page("c2", page(&[2], Some("c3")));
    let context = context(&backend, config);
    let table = context.table(TableKind::Samples);
    table.load().await.unwrap();

    let gate = backend.hold(Op::Fetch);
    let (first, (second, direct)) = tokio::join!(table.on_scroll(near_bottom()), async {
        gate.wait_entered().await;
        let second = table.on_scroll(near_bottom()).await;
        let direct = context.cache().load_more(&table.identity()).await;
        gate.release();
        (second, direct)
    });

    assert_eq!(first.unwrap(), Some(LoadOutcome::Appended { rows: 1, has_more: true }));
    assert_eq!(second.unwrap(), None);
    assert_eq!(direct.unwrap(), LoadOutcome::Skipped(SkipReason::InFlight));
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn failed_page_keeps_rows_and_allows_retry() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(&first_key(TableKind::Samples, &config), page(&[1], Some("c2")));
    backend.add_page("c2", page(&[2], None));
    let table = context(&backend, config).table(TableKind::Samples);
    table.load().await.unwrap();

    backend.fail_next(Op::Fetch, ClientError::status(502, "bad gateway"));
    assert!(table.on_scroll(near_bottom()).await.is_err());
    let view = table.view();
    assert_eq!(view.row_ids(), vec![RowId(1)]);
    assert!(view.error.is_some());
    assert!(!view.is_fetching);

    table.on_scroll(near_bottom()).await.unwrap();
    assert_eq!(table.view().row_ids(), vec![RowId(1), RowId(2)]);
}

#[tokio::test]
async fn bulk_delete_invalidates_and_refetches_from_first_page() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    let key = first_key(TableKind::SampleMarkerAnalysis, &config);
    backend.add_page(&key, page(&[1, 2, 3, 4, 5], None));
    let table = context(&backend, config).table(TableKind::SampleMarkerAnalysis);
    table.load().await.unwrap();

    table.toggle_row(RowId(1));
    table.toggle_row(RowId(3));
    assert_eq!(table.header_state(), HeaderState::Indeterminate);

    let deleted = table.delete_selected().await.unwrap();
    assert_eq!(deleted, vec![RowId(1), RowId(3)]);
    assert_eq!(table.selected_count(), 0);
    assert!(table.view().is_empty());

    let bulk = backend.requests_of(Op::BulkDelete);
    assert_eq!(
        bulk,
        vec![Request::BulkDelete {
            endpoint: endpoints::SAMPLE_MARKER_ANALYSIS.to_string(),
            ids: vec![RowId(1), RowId(3)],
        }]
    );

    backend.clear_requests();
    backend.add_page(&key, page(&[2, 4, 5], None));
    let view = table.load().await.unwrap();
    assert_eq!(backend.fetched_keys(), vec![key]);
    assert_eq!(view.row_ids(), vec![RowId(2), RowId(4), RowId(5)]);
}

#[tokio::test]
async fn failed_bulk_delete_keeps_selection() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(&first_key(TableKind::SampleMarkerAnalysis, &config), page(&[1, 2], None));
    let context = context(&backend, config);
    let table = context.table(TableKind::SampleMarkerAnalysis);
    table.load().await.unwrap();
    table.toggle_all();

    backend.fail_next(Op::BulkDelete, ClientError::Transport("offline".into()));
    assert!(table.delete_selected().await.is_err());
    assert_eq!(table.header_state(), HeaderState::Checked);
    assert_eq!(table.view().len(), 2);
    assert_eq!(context.notifications().messages(Level::Error), vec![GENERIC_ERROR]);
}

#[tokio::test]
async fn changing_filters_starts_a_new_collection() {
    let backend = FakeBackend::new();
    let config = GridConfig::default();
    let context = context(&backend, config.clone());
    let table = context.table(TableKind::AnalysisSamples);
    let old = table.identity();
    backend.add_page(old.key(), page(&[1, 2], Some("c2")));
    backend.add_page("c2", page(&[3], None));

    table.load().await.unwrap();
    table.on_scroll(near_bottom()).await.unwrap();
    table.toggle_all();
    assert_eq!(table.selected_count(), 3);

    let form = FilterForm {
        year: Some(2021),
        ..FilterForm::default()
    };
    assert!(table.set_filters(form.to_filter_set()));
    assert!(!table.set_filters(form.to_filter_set()));

    assert!(!context.cache().contains(&old));
    assert_eq!(table.selected_count(), 0);
    let view = table.view();
    assert!(view.is_empty());
    assert!(view.has_more);
    assert_eq!(
        table.identity().key(),
        "/api/samples/?order__status__not=draft&year=2021"
    );
}

#[tokio::test]
async fn markers_join_the_identity() {
    let backend = FakeBackend::new();
    let table = context(&backend, GridConfig::default()).table(TableKind::AnalysisSamples);
    table.set_markers(vec!["COI".into(), "Cytb".into()]);
    backend.add_page(table.identity().key(), page(&[7], None));

    table.load().await.unwrap();
    assert_eq!(
        backend.fetched_keys(),
        vec!["/api/samples/?order__status__not=draft&markers=COI&markers=Cytb".to_string()]
    );
}

#[tokio::test]
async fn unchanged_cell_sends_nothing_and_changed_cell_sends_one_patch() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(
        &first_key(TableKind::Samples, &config),
        Page::new(vec![sample_row(1, 2020)], None),
    );
    let table = context(&backend, config).table(TableKind::Samples);
    table.load().await.unwrap();
    table.mount_cell(RowId(1), "year").unwrap();

    table.focus_cell(RowId(1), "year").unwrap();
    table.edit_cell(RowId(1), "year", CellValue::Number(2020.0)).unwrap();
    assert_eq!(table.blur_cell(RowId(1), "year").await.unwrap(), CommitOutcome::Unchanged);
    assert!(backend.requests_of(Op::Patch).is_empty());

    table.focus_cell(RowId(1), "year").unwrap();
    table.edit_cell(RowId(1), "year", CellValue::Number(2021.0)).unwrap();
    assert_eq!(table.blur_cell(RowId(1), "year").await.unwrap(), CommitOutcome::Saved);

    let patches = backend.requests_of(Op::Patch);
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        Request::Patch { endpoint, id, fields } => {
            assert_eq!(endpoint, endpoints::SAMPLES);
            assert_eq!(*id, RowId(1));
            assert_eq!(Value::Object(fields.clone()), json!({"id": 1, "year": 2021.0}));
        }
        other => panic!("unexpected request {other:?}"),
    }
    assert_eq!(
        table.cell(RowId(1), "year").map(|c| c.state().clone()),
        Some(CellState::Clean)
    );
}

#[tokio::test]
async fn failed_cell_commit_keeps_draft_and_shows_field_error() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    backend.add_page(
        &first_key(TableKind::Samples, &config),
        Page::new(vec![sample_row(1, 2020)], None),
    );
    let context = context(&backend, config);
    let table = context.table(TableKind::Samples);
    table.load().await.unwrap();
    table.mount_cell(RowId(1), "year").unwrap();

    backend.fail_next(
        Op::Patch,
        ClientError::Validation {
            status: 400,
            payload: ErrorPayload::validation(vec![FieldError::new("year", "invalid", "must be numeric")]),
        },
    );
    let draft = CellValue::Text("twenty".into());
    table.edit_cell(RowId(1), "year", draft.clone()).unwrap();
    let outcome = table.blur_cell(RowId(1), "year").await.unwrap();

    let CommitOutcome::Failed(error) = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert_eq!(error.messages, vec!["year - must be numeric"]);

    let cell = table.cell(RowId(1), "year").unwrap();
    assert_eq!(cell.draft(), &draft);
    assert!(matches!(cell.state(), CellState::DirtyWithError(_)));
    assert_eq!(
        context.notifications().messages(Level::Error),
        vec!["year - must be numeric"]
    );
}

#[tokio::test]
async fn refetch_does_not_clobber_dirty_drafts() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(1);
    let key = first_key(TableKind::Samples, &config);
    backend.add_page(&key, Page::new(vec![sample_row(1, 2020), sample_row(2, 2020)], None));
    let context = context(&backend, config);
    let table = context.table(TableKind::Samples);
    table.load().await.unwrap();
    table.mount_cell(RowId(1), "year").unwrap();
    table.mount_cell(RowId(2), "year").unwrap();
    table.edit_cell(RowId(1), "year", CellValue::Number(1999.0)).unwrap();

    backend.add_page(&key, Page::new(vec![sample_row(1, 2024), sample_row(2, 2024)], None));
    context.cache().invalidate(&table.identity());
    table.load().await.unwrap();

    let dirty = table.cell(RowId(1), "year").unwrap();
    assert_eq!(dirty.draft(), &CellValue::Number(1999.0));
    let clean = table.cell(RowId(2), "year").unwrap();
    assert_eq!(clean.draft(), &CellValue::Number(2024.0));
}

#[tokio::test]
async fn select_cell_uses_remote_options() {
    let backend = FakeBackend::new();
    backend.set_options("species", vec![OptionItem::new(9, "Alces alces")]);
    let config = GridConfig::default().with_order(1);
    backend.add_page(
        &first_key(TableKind::Samples, &config),
        Page::new(vec![sample_row(1, 2020)], None),
    );
    let table = context(&backend, config).table(TableKind::Samples);
    table.load().await.unwrap();
    table.mount_cell(RowId(1), "species").unwrap();

    let options = table.search_options("species", "alces").await.unwrap();
    table.search_options("species", "alces").await.unwrap();
    assert_eq!(backend.search_count(), 1);

    table
        .edit_cell(RowId(1), "species", CellValue::Select(options[0].clone()))
        .unwrap();
    table.blur_cell(RowId(1), "species").await.unwrap();
    match &backend.requests_of(Op::Patch)[0] {
        Request::Patch { fields, .. } => assert_eq!(fields.get("species"), Some(&json!(9))),
        other => panic!("unexpected request {other:?}"),
    }
}

#[tokio::test]
async fn read_only_columns_cannot_be_mounted() {
    let backend = FakeBackend::new();
    let table = context(&backend, GridConfig::default()).table(TableKind::AnalysisSamples);
    assert_eq!(
        table.mount_cell(RowId(1), "year").unwrap_err(),
        GridError::NotEditable("year".into())
    );
}

#[tokio::test]
async fn apply_markers_clears_selection() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(3);
    let context = context(&backend, config);
    let table = context.table(TableKind::AnalysisSamples);
    backend.add_page(table.identity().key(), page(&[10, 11], None));
    table.load().await.unwrap();
    table.toggle_all();

    table.apply_markers(&["COI".into()]).await.unwrap();
    assert_eq!(table.selected_count(), 0);
    assert_eq!(
        backend.requests_of(Op::BulkCreate),
        vec![Request::BulkCreate {
            endpoint: endpoints::SAMPLE_MARKER_ANALYSIS.to_string(),
            body: json!({"order": 3, "samples": [10, 11], "markers": ["COI"]}),
        }]
    );
    assert_eq!(context.notifications().messages(Level::Success), vec!["Markers applied!"]);
}

#[tokio::test]
async fn sample_form_resets_only_after_success() {
    let backend = FakeBackend::new();
    let config = GridConfig::default().with_order(5);
    let context = context(&backend, config.clone());
    let mut form = SampleForm {
        species: Some(OptionItem::new(1, "Ursus arctos")),
        year: Some(2024),
        quantity: 2,
        name: vec!["a".into(), "b".into()],
        ..SampleForm::default()
    };

    backend.fail_next(Op::BulkCreate, ClientError::status(500, "boom"));
    assert!(form.submit(context.coordinator(), &config).await.is_err());
    assert_eq!(form.quantity, 2);

    form.submit(context.coordinator(), &config).await.unwrap();
    assert_eq!(form, SampleForm::default());
    assert_eq!(context.notifications().messages(Level::Success), vec!["Samples added!"]);

    let mut invalid = SampleForm {
        quantity: 3,
        name: vec!["only one".into()],
        ..SampleForm::default()
    };
    let err = invalid.submit(context.coordinator(), &config).await.unwrap_err();
    assert!(matches!(err, GridError::FormInvalid(_)));
    assert_eq!(backend.requests_of(Op::BulkCreate).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_staff_assignment_cancels_the_first() {
    let backend = FakeBackend::new();
    let context = context(&backend, GridConfig::default());
    let form = context.staff_assignment("/staff/orders/1/assign/");
    let gate = backend.hold(Op::Post);

    let (first, second) = tokio::join!(form.assign(&[1]), async {
        gate.wait_entered().await;
        assert_eq!(form.status(), StatusIndicator::Spinner);
        let second = form.assign(&[1, 2]).await;
        gate.release();
        second
    });

    assert_eq!(first, AssignOutcome::Superseded);
    assert_eq!(second, AssignOutcome::Saved);
    assert_eq!(form.status(), StatusIndicator::Success);

    let posts = backend.requests_of(Op::Post);
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[1],
        Request::Post {
            url: "/staff/orders/1/assign/".into(),
            body: json!({"user_ids": [1, 2]}),
        }
    );
}

#[tokio::test]
async fn superseded_assignment_never_moves_the_indicator() {
    let backend = FakeBackend::new();
    let context = context(&backend, GridConfig::default());
    let form = context.staff_assignment("/staff/orders/1/assign/");
    let gate = backend.hold(Op::Post);

    // the held first request would succeed; the second fails
    let (first, second) = tokio::join!(form.assign(&[1]), async {
        gate.wait_entered().await;
        backend.fail_next(Op::Post, ClientError::status(403, "forbidden"));
        let second = form.assign(&[2]).await;
        gate.release();
        second
    });

    assert_eq!(first, AssignOutcome::Superseded);
    assert!(matches!(second, AssignOutcome::Failed(_)));
    assert_eq!(form.status(), StatusIndicator::Error);
}
