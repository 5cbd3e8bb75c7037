//! Default data for fresh installations.
//!
//! `seed_defaults` is safe to run on every start: rows that already exist (matched
//! by email or title) are left alone, and role grants are rewritten to their
//! defaults.

use crate::{
    auth::hash_password,
    error::AppError,
    gate::Role,
    models::{NewUser, SeriesFields, VideoFields},
    repository::Repository,
};

/// A user created by the seeder, with the role it is given (if any).
struct DefaultUser {
    name: &'static str,
    email: &'static str,
    role: Option<Role>,
}

const DEFAULT_USERS: [DefaultUser; 5] = [
    DefaultUser {
        name: "Super Admin",
        email: "superadmin@videosapp.com",
        role: Some(Role::SuperAdmin),
    },
    DefaultUser {
        name: "Regular User",
        email: "regular@videosapp.com",
        role: None,
    },
    DefaultUser {
        name: "Video Manager",
        email: "videosmanager@videosapp.com",
        role: Some(Role::VideoManager),
    },
    DefaultUser {
        name: "Professor",
        email: "professor@videosapp.com",
        role: None,
    },
    DefaultUser {
        name: "Alumne",
        email: "alumne@videosapp.com",
        role: None,
    },
];

const DEFAULT_SERIES: &str = "Introducció";

const DEFAULT_VIDEOS: [(&str, &str, &str); 3] = [
    (
        "Benvinguda",
        "Presentació del curs i de la plataforma.",
        "https://www.youtube.com/embed/dQw4w9WgXcQ",
    ),
    (
        "Instal·lació de l'entorn",
        "Com preparar l'entorn de desenvolupament pas a pas.",
        "https://www.youtube.com/embed/9bZkp7q19f0",
    ),
    (
        "Primer projecte",
        "Creació i execució del primer projecte.",
        "https://www.youtube.com/embed/kJQP7kiw5Fk",
    ),
];

/// What a seeding run actually inserted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub series_created: usize,
    pub videos_created: usize,
}

/// seed_defaults
///
/// Grants every role its default permissions, creates the five default accounts with
/// `default_password`, and files the default videos under the default series.
pub async fn seed_defaults(
    repo: &dyn Repository,
    default_password: &str,
) -> Result<SeedReport, AppError> {
    let mut report = SeedReport::default();

    for role in Role::ALL {
        repo.define_role(role, role.default_permissions()).await?;
    }

    for default in &DEFAULT_USERS {
        if repo.email_taken(default.email, None).await? {
            continue;
        }
        let user = repo
            .create_user(NewUser {
                name: default.name.to_string(),
                email: default.email.to_string(),
                password_hash: hash_password(default_password)?,
            })
            .await?;
        if let Some(role) = default.role {
            repo.set_user_roles(user.id, &[role]).await?;
        }
        report.users_created += 1;
    }

    let series_id = match repo
        .list_series()
        .await?
        .into_iter()
        .find(|s| s.title == DEFAULT_SERIES)
    {
        Some(series) => series.id,
        None => {
            report.series_created += 1;
            repo.create_series(SeriesFields {
                title: DEFAULT_SERIES.to_string(),
                description: Some("Vídeos introductoris del curs.".to_string()),
            })
            .await?
            .id
        }
    };

    let owner = repo
        .find_credentials(DEFAULT_USERS[0].email)
        .await?
        .map(|credentials| credentials.id);
    let existing = repo.list_videos().await?;
    for (title, description, url) in DEFAULT_VIDEOS {
        if existing.iter().any(|v| v.title == title) {
            continue;
        }
        repo.create_video(
            VideoFields {
                title: title.to_string(),
                description: description.to_string(),
                url: url.to_string(),
                series_id: Some(series_id),
            },
            owner,
        )
        .await?;
        report.videos_created += 1;
    }

    tracing::info!(
        users = report.users_created,
        series = report.series_created,
        videos = report.videos_created,
        "seeding finished"
    );
    Ok(report)
}
