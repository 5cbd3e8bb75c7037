mod common;

use common::MemoryRepo;
use videos_app::{
    auth::verify_password,
    gate::{Permission, Role},
    repository::Repository,
    seed::{SeedReport, seed_defaults},
};

#[tokio::test]
async fn seeding_creates_defaults_once() {
    let repo = MemoryRepo::new();

    let first = seed_defaults(repo.as_ref(), "12345678").await.unwrap();
    assert_eq!(
        first,
        SeedReport {
            users_created: 5,
            series_created: 1,
            videos_created: 3,
        }
    );

    let second = seed_defaults(repo.as_ref(), "12345678").await.unwrap();
    assert_eq!(second, SeedReport::default());
    assert_eq!(repo.users().len(), 5);
    assert_eq!(repo.series().len(), 1);
    assert_eq!(repo.videos().len(), 3);
}

#[tokio::test]
async fn seeded_accounts_get_their_roles() {
    let repo = MemoryRepo::new();
    seed_defaults(repo.as_ref(), "12345678").await.unwrap();

    let admin = repo
        .find_credentials("superadmin@videosapp.com")
        .await
        .unwrap()
        .unwrap();
    assert!(verify_password("12345678", &admin.password_hash));
    let access = repo.get_access(admin.id).await.unwrap();
    assert!(access.has_role(Role::SuperAdmin));
    assert!(access.can(Permission::ManageUsers));

    let manager = repo
        .find_credentials("videosmanager@videosapp.com")
        .await
        .unwrap()
        .unwrap();
    let access = repo.get_access(manager.id).await.unwrap();
    assert!(access.can(Permission::VideosManager));
    assert!(!access.can(Permission::ManageUsers));

    let regular = repo
        .find_credentials("regular@videosapp.com")
        .await
        .unwrap()
        .unwrap();
    let access = repo.get_access(regular.id).await.unwrap();
    assert!(access.roles.is_empty());
    assert!(access.permissions.is_empty());
}

#[tokio::test]
async fn seeded_videos_belong_to_the_default_series() {
    let repo = MemoryRepo::new();
    seed_defaults(repo.as_ref(), "12345678").await.unwrap();

    let series = repo.series().pop().unwrap();
    let videos = repo.videos_in_series(series.id).await.unwrap();
    assert_eq!(videos.len(), 3);
    assert!(videos.iter().all(|v| v.user_id.is_some()));
}
