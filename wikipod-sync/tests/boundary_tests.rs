mod common;

use common::{Failure, Op, fixture, quiet_config, seed};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use wikipod_sync::{AdaptorInfo, HostBoundary, SyncError};
use wikipod_types::Tiddler;

const TW: &str = "/public/tw";

fn boundary(fx: &common::Fixture) -> HostBoundary {
    HostBoundary::new(fx.adaptor.clone(), Handle::current())
}

/// Captures whatever a callback hands over.
fn slot<T>() -> Arc<Mutex<Option<T>>> {
    Arc::new(Mutex::new(None))
}

// ── Status and login ────────────────────────────────────────────

#[tokio::test]
async fn status_callback_reports_logged_out() {
    let fx = fixture(quiet_config(TW));
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .get_status(move |err, logged_in, name| {
            *out.lock().unwrap() = Some((err.is_none(), logged_in, name));
        })
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().take(), Some((true, false, None)));
}

#[tokio::test]
async fn login_then_status_reports_user() {
    let fx = fixture(quiet_config(TW));
    let b = boundary(&fx);

    let login_err = slot();
    let out = login_err.clone();
    b.login(move |err| *out.lock().unwrap() = Some(err.is_none()))
        .await
        .unwrap();
    assert_eq!(login_err.lock().unwrap().take(), Some(true));

    let seen = slot();
    let out = seen.clone();
    b.get_status(move |_, logged_in, name| *out.lock().unwrap() = Some((logged_in, name)))
        .await
        .unwrap();
    assert_eq!(
        seen.lock().unwrap().take(),
        Some((true, Some("alice".to_string())))
    );
}

#[tokio::test]
async fn login_error_is_an_error_value() {
    let fx = fixture(quiet_config("/nowhere"));
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .login(move |err| *out.lock().unwrap() = err)
        .await
        .unwrap();

    assert!(matches!(seen.lock().unwrap().take(), Some(SyncError::Config(_))));
}

// ── Documents ───────────────────────────────────────────────────

#[tokio::test]
async fn skinny_listing_while_logged_out_is_empty() {
    let fx = fixture(quiet_config(TW));
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .get_skinny_tiddlers(move |err, entries| {
            *out.lock().unwrap() = Some((err.is_none(), entries));
        })
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().take(), Some((true, Some(Vec::new()))));
    assert!(fx.store.calls().is_empty());
}

#[tokio::test]
async fn save_callback_gets_location_and_revision() {
    let fx = fixture(quiet_config(TW));
    fx.adaptor.login().await.unwrap();
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .save_tiddler(
            Tiddler::new("Alpha").with_text("hello"),
            None,
            move |err, info, revision| *out.lock().unwrap() = Some((err.is_none(), info, revision)),
        )
        .await
        .unwrap();

    let (ok, info, revision) = seen.lock().unwrap().take().unwrap();
    assert!(ok);
    assert_eq!(info, Some(AdaptorInfo::at(TW)));
    assert_eq!(revision.map(|r| r.len()), Some(64));
}

#[tokio::test]
async fn failed_save_callback_keeps_bookkeeping() {
    let fx = fixture(quiet_config(TW));
    fx.adaptor.login().await.unwrap();
    fx.store.fail(Op::Write, "Alpha", Failure::Transport);
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .save_tiddler(
            Tiddler::new("Alpha").with_text("hello"),
            None,
            move |err, info, revision| *out.lock().unwrap() = Some((err, info, revision)),
        )
        .await
        .unwrap();

    let (err, info, revision) = seen.lock().unwrap().take().unwrap();
    assert!(matches!(err, Some(SyncError::Transport(_))));
    assert_eq!(info, Some(AdaptorInfo::at(TW)));
    assert!(revision.is_some());
}

#[tokio::test]
async fn load_callback_reports_not_found_anywhere() {
    let fx = fixture(quiet_config(&format!("{TW}\n/private/tw")));
    fx.adaptor.login().await.unwrap();
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .load_tiddler("Missing".to_string(), move |err, tiddler| {
            *out.lock().unwrap() = Some((err, tiddler));
        })
        .await
        .unwrap();

    let (err, tiddler) = seen.lock().unwrap().take().unwrap();
    assert!(matches!(err, Some(SyncError::NotFoundAnywhere { .. })));
    assert!(tiddler.is_none());
}

#[tokio::test]
async fn load_and_delete_round_trip() {
    let fx = fixture(quiet_config(TW));
    fx.adaptor.login().await.unwrap();
    seed(&fx.store, TW, &Tiddler::new("Alpha").with_text("hello"));
    let b = boundary(&fx);

    let loaded = slot();
    let out = loaded.clone();
    b.load_tiddler("Alpha".to_string(), move |_, tiddler| *out.lock().unwrap() = tiddler)
        .await
        .unwrap();
    let tiddler = loaded.lock().unwrap().take().unwrap();
    assert_eq!(tiddler.text.as_deref(), Some("hello"));

    let info = b.get_tiddler_info(&tiddler);
    assert_eq!(info, AdaptorInfo::at(TW));

    let deleted = slot();
    let out = deleted.clone();
    b.delete_tiddler("Alpha".to_string(), Some(info), move |err| {
        *out.lock().unwrap() = Some(err.is_none());
    })
    .await
    .unwrap();
    assert_eq!(deleted.lock().unwrap().take(), Some(true));
    assert!(fx.store.get(&format!("{TW}/Alpha")).is_none());
}

#[tokio::test]
async fn logout_callback() {
    let fx = fixture(quiet_config(TW));
    fx.adaptor.login().await.unwrap();
    let seen = slot();
    let out = seen.clone();

    boundary(&fx)
        .logout(move |err| *out.lock().unwrap() = Some(err.is_none()))
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().take(), Some(true));
    assert_eq!(fx.store.token(), None);
}
