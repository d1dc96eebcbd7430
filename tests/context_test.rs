// ABOUTME: Tests for the per-task request identity slot
// ABOUTME: Verifies isolation between concurrent tasks and scope hygiene

use mcphub_server::context::{self, RequestIdentity};

fn identity(key_id: &str, project: &str) -> RequestIdentity {
    RequestIdentity {
        key_id: key_id.to_owned(),
        project_id: project.to_owned(),
        scope: "read".into(),
        is_global: project == "*",
    }
}

#[tokio::test]
async fn test_set_get_clear_within_scope() {
    context::scope(async {
        assert!(context::get().is_none());

        context::set(identity("key_a", "wordpress_site1"));
        let current = context::get().unwrap();
        assert_eq!(current.key_id, "key_a");
        assert_eq!(current.project_id, "wordpress_site1");
        assert!(!current.is_global);

        context::clear();
        assert!(context::get().is_none());
    })
    .await;
}

#[tokio::test]
async fn test_outside_scope_is_inert() {
    // Without a scope installed, set is ignored and get returns None
    context::set(identity("key_a", "*"));
    assert!(context::get().is_none());
    context::clear();
}

#[tokio::test]
async fn test_scopes_do_not_leak_between_sequential_requests() {
    context::scope(async {
        context::set(identity("key_a", "wordpress_site1"));
    })
    .await;

    context::scope(async {
        assert!(context::get().is_none());
    })
    .await;
}

#[tokio::test]
async fn test_concurrent_tasks_see_their_own_identity() {
    let mut handles = Vec::new();

    for i in 0..16 {
        handles.push(tokio::spawn(context::scope(async move {
            let key = format!("key_{i}");
            context::set(identity(&key, "wordpress_site1"));

            // Yield so tasks interleave on the runtime
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }

            let observed = context::get().unwrap();
            assert_eq!(observed.key_id, key);
        })));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_master_identity_shape() {
    let master = RequestIdentity::master();
    assert_eq!(master.key_id, "master");
    assert_eq!(master.project_id, "*");
    assert_eq!(master.scope, "admin");
    assert!(master.is_global);
}
