mod common;

use axum::http::{Method, StatusCode};
use common::{MemoryRepo, request, send, state_with};
use serde_json::json;
use uuid::Uuid;
use videos_app::{
    create_router,
    gate::Permission,
    storage::{MockStorageService, S3StorageClient, StorageService},
};

mod s3_tests {
    use super::*;

    fn client() -> S3StorageClient {
        S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
    }

    #[tokio::test]
    async fn presigned_url_targets_bucket_and_key() {
        let key = format!("videos/{}.mp4", Uuid::new_v4());
        let url = client()
            .presigned_upload_url(&key, "video/mp4")
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/testbucket/"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Signature"));
    }

    #[test]
    fn public_url_is_path_style_and_sanitized() {
        assert_eq!(
            client().public_url("videos/../a.mp4"),
            "http://localhost:9000/testbucket/videos/a.mp4"
        );
    }
}

mod upload_handler_tests {
    use super::*;

    #[tokio::test]
    async fn manager_receives_presigned_url_under_videos_prefix() {
        let repo = MemoryRepo::new();
        let manager = repo.add_user("Manager", &[], &[Permission::VideosManager]);
        let app = create_router(state_with(repo, MockStorageService::new()));

        let res = send(
            &app,
            request(
                Method::POST,
                "/videos/manage/upload",
                Some(manager.id),
                Some(json!({ "filename": "Lesson 01.MP4", "content_type": "video/mp4" })),
            ),
        )
        .await;

        assert_eq!(res.status, StatusCode::OK);
        let key = res.body["resource_key"].as_str().unwrap();
        assert!(key.starts_with("videos/"));
        assert!(key.ends_with(".mp4"));
        assert_eq!(
            res.body["public_url"],
            format!("http://localhost:9000/mock-bucket/{key}")
        );
        assert!(
            res.body["upload_url"]
                .as_str()
                .unwrap()
                .ends_with("?signature=fake")
        );
    }

    #[tokio::test]
    async fn non_video_content_type_is_rejected() {
        let repo = MemoryRepo::new();
        let manager = repo.add_user("Manager", &[], &[Permission::VideosManager]);
        let app = create_router(state_with(repo, MockStorageService::new()));

        let res = send(
            &app,
            request(
                Method::POST,
                "/videos/manage/upload",
                Some(manager.id),
                Some(json!({ "filename": "notes.pdf", "content_type": "application/pdf" })),
            ),
        )
        .await;

        assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            res.field_errors("content_type"),
            vec!["The content type field must be a video MIME type."]
        );
    }

    #[tokio::test]
    async fn storage_outage_is_a_server_error() {
        let repo = MemoryRepo::new();
        let manager = repo.add_user("Manager", &[], &[Permission::VideosManager]);
        let app = create_router(state_with(repo, MockStorageService::new_failing()));

        let res = send(
            &app,
            request(
                Method::POST,
                "/videos/manage/upload",
                Some(manager.id),
                Some(json!({ "filename": "a.mp4", "content_type": "video/mp4" })),
            ),
        )
        .await;

        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn upload_requires_videos_manager() {
        let repo = MemoryRepo::new();
        let regular = repo.add_user("Regular", &[], &[]);
        let app = create_router(state_with(repo, MockStorageService::new()));

        let res = send(
            &app,
            request(
                Method::POST,
                "/videos/manage/upload",
                Some(regular.id),
                Some(json!({ "filename": "a.mp4", "content_type": "video/mp4" })),
            ),
        )
        .await;

        assert_eq!(res.status, StatusCode::FORBIDDEN);
    }
}
