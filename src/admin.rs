//! Headless admin surface: CRUD on songs, categories and admin accounts.
//!
//! Writes go through an admin session. Credentials come from the
//! CHORALE_ADMIN_EMAIL and CHORALE_ADMIN_PASSWORD environment variables so
//! they never land in shell history.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};

use crate::config::Config;
use crate::remote::auth::{AdminSession, AuthClient};
use crate::remote::client::RecordClient;
use crate::remote::storage::{StorageClient, AUDIO_BUCKET, SHEET_MUSIC_BUCKET};
use crate::remote::types::{NewSong, SongUpdate};
use crate::remote::Reachability;

#[derive(Subcommand, Debug)]
pub enum AdminAction {
  /// Create an admin account
  Signup { email: String },
  /// List admin accounts
  Admins,
  /// Remove an admin role (super admins only)
  RemoveAdmin { role_id: String },
  /// Add a song, uploading attachments when given
  AddSong {
    title: String,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    lyrics: Option<String>,
    /// Category id
    #[arg(long)]
    category: Option<String>,
    /// Sheet-music file to upload
    #[arg(long)]
    sheet: Option<PathBuf>,
    /// Audio file to upload
    #[arg(long)]
    audio: Option<PathBuf>,
  },
  /// Update song fields
  EditSong {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    lyrics: Option<String>,
    /// Category id
    #[arg(long)]
    category: Option<String>,
    /// Detach the song from its category
    #[arg(long)]
    clear_category: bool,
  },
  /// Delete a song and its attachments
  RemoveSong { id: String },
  /// List categories
  Categories,
  /// Create a category
  AddCategory { name: String },
  /// Rename a category
  RenameCategory { id: String, name: String },
  /// Delete a category; refused while songs still reference it
  RemoveCategory { id: String },
}

pub async fn run(config: &Config, action: AdminAction) -> Result<()> {
  let net = Reachability::new(true);
  let api_key = Config::api_key()?;
  let records = RecordClient::new(&config.remote.url, api_key.clone(), net.clone())?;
  let files = StorageClient::new(&config.remote.url, api_key.clone(), net.clone())?;
  let auth = AuthClient::new(&config.remote.url, api_key, net)?;

  // Signup is the one action without an existing session.
  if let AdminAction::Signup { email } = &action {
    let password = admin_password()?;
    auth.sign_up(email, &password).await?;
    let session = auth.sign_in(email, &password).await?;
    println!("admin account created: {} ({:?})", email, session.role);
    let _ = auth.sign_out(&session.access_token).await;
    return Ok(());
  }

  let session = sign_in(&auth).await?;
  records.set_session(Some(session.access_token.clone()));

  let outcome = execute(&records, &files, &session, action).await;
  let _ = auth.sign_out(&session.access_token).await;
  outcome
}

async fn execute(
  records: &RecordClient,
  files: &StorageClient,
  session: &AdminSession,
  action: AdminAction,
) -> Result<()> {
  match action {
    AdminAction::Signup { .. } => unreachable!("handled before sign-in"),
    AdminAction::Admins => {
      for role in records.admin_roles().await? {
        println!(
          "{}  {}  {:?}  {}",
          role.id, role.user_id, role.role, role.created_at
        );
      }
    }
    AdminAction::RemoveAdmin { role_id } => {
      if !session.can_manage_admins() {
        return Err(eyre!("only super admins can remove admins"));
      }
      records.delete_admin_role(&role_id).await?;
      println!("admin role {} removed", role_id);
    }
    AdminAction::AddSong {
      title,
      author,
      lyrics,
      category,
      sheet,
      audio,
    } => {
      let file_path = match sheet {
        Some(p) => Some(upload(files, SHEET_MUSIC_BUCKET, &p).await?),
        None => None,
      };
      let audio_path = match audio {
        Some(p) => Some(upload(files, AUDIO_BUCKET, &p).await?),
        None => None,
      };

      let song = records
        .create_song(&NewSong {
          title,
          author,
          lyrics,
          category_id: category,
          file_path: file_path.clone(),
          audio_path,
        })
        .await?;
      println!("created song {} ({})", song.title, song.id);
      if let Some(path) = file_path {
        println!("sheet music: {}", files.public_url(SHEET_MUSIC_BUCKET, &path)?);
      }
    }
    AdminAction::EditSong {
      id,
      title,
      author,
      lyrics,
      category,
      clear_category,
    } => {
      let update = SongUpdate {
        title,
        author,
        lyrics,
        category_id: if clear_category {
          Some(None)
        } else {
          category.map(Some)
        },
        ..Default::default()
      };
      let song = records.update_song(&id, &update).await?;
      println!("updated song {} ({})", song.title, song.id);
    }
    AdminAction::RemoveSong { id } => {
      records.delete_song(&id, files).await?;
      println!("song {} deleted", id);
    }
    AdminAction::Categories => {
      for category in records.categories().await? {
        println!("{}  {}", category.id, category.name);
      }
    }
    AdminAction::AddCategory { name } => {
      let category = records.create_category(&name).await?;
      println!("created category {} ({})", category.name, category.id);
    }
    AdminAction::RenameCategory { id, name } => {
      let category = records.rename_category(&id, &name).await?;
      println!("renamed category to {} ({})", category.name, category.id);
    }
    AdminAction::RemoveCategory { id } => {
      records.delete_category(&id).await?;
      println!("category {} deleted", id);
    }
  }
  Ok(())
}

async fn sign_in(auth: &AuthClient) -> Result<AdminSession> {
  let email = std::env::var("CHORALE_ADMIN_EMAIL")
    .map_err(|_| eyre!("Set CHORALE_ADMIN_EMAIL to your admin account email."))?;
  let password = admin_password()?;
  Ok(auth.sign_in(&email, &password).await?)
}

fn admin_password() -> Result<String> {
  std::env::var("CHORALE_ADMIN_PASSWORD")
    .map_err(|_| eyre!("Set CHORALE_ADMIN_PASSWORD to your admin account password."))
}

/// Upload a local file under a timestamped object key and return the key.
async fn upload(files: &StorageClient, bucket: &str, path: &Path) -> Result<String> {
  let bytes = tokio::fs::read(path)
    .await
    .map_err(|e| eyre!("cannot read {}: {}", path.display(), e))?;
  let name = path
    .file_name()
    .and_then(|n| n.to_str())
    .ok_or_else(|| eyre!("bad file name: {}", path.display()))?;
  let key = format!("{}_{}", Utc::now().timestamp(), name);
  Ok(files.upload(bucket, &key, bytes, content_type_for(name)).await?)
}

fn content_type_for(name: &str) -> &'static str {
  let ext = name.rsplit('.').next().map(|e| e.to_ascii_lowercase());
  match ext.as_deref() {
    Some("pdf") => "application/pdf",
    Some("png") => "image/png",
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("mp3") => "audio/mpeg",
    Some("ogg") => "audio/ogg",
    Some("wav") => "audio/wav",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_content_type_for() {
    assert_eq!(content_type_for("gloria.PDF"), "application/pdf");
    assert_eq!(content_type_for("take1.mp3"), "audio/mpeg");
    assert_eq!(content_type_for("scan.jpeg"), "image/jpeg");
    assert_eq!(content_type_for("noext"), "application/octet-stream");
  }
}
