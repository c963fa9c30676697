//! Scriptable in-memory [`SocialService`] for tests.
//!
//! Supports failure injection, call counting, and gates that hold a
//! response until the test releases it, to drive out-of-order resolution.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::SocialService;
use crate::error::RemoteError;
use crate::model::{FollowedUserSummary, Identity, MediaFile, Post, UploadedImage};

#[derive(Default)]
pub(crate) struct Gates(Mutex<VecDeque<oneshot::Receiver<()>>>);

impl Gates {
    /// Hold the next call until the returned sender fires (or drops).
    pub(crate) fn add(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.0.lock().unwrap().push_back(rx);
        tx
    }

    async fn wait(&self) {
        let gate = self.0.lock().unwrap().pop_front();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
    }
}

#[derive(Default)]
pub(crate) struct Calls {
    pub identity: AtomicUsize,
    pub unread: AtomicUsize,
    pub logout: AtomicUsize,
    pub follow: AtomicUsize,
    pub unfollow: AtomicUsize,
    pub directory: AtomicUsize,
    pub posts: AtomicUsize,
    pub upload: AtomicUsize,
}

#[derive(Default)]
pub(crate) struct FakeSocialService {
    pub identity: Mutex<Option<Identity>>,
    /// Scripted unread counts, consumed in order; `Err(())` is a network failure.
    pub unread: Mutex<VecDeque<Result<u64, ()>>>,
    pub directory: Mutex<Vec<FollowedUserSummary>>,
    pub posts: Mutex<Vec<Post>>,
    pub uploaded_url: Mutex<String>,

    pub fail_identity: AtomicBool,
    pub fail_logout: AtomicBool,
    pub fail_follow: AtomicBool,
    pub fail_directory: AtomicBool,
    pub fail_posts: AtomicBool,
    pub fail_upload: AtomicBool,

    pub identity_gates: Gates,
    pub unread_gates: Gates,
    pub directory_gates: Gates,
    pub posts_gates: Gates,
    pub upload_gates: Gates,

    pub calls: Calls,
    /// Remote-side view of who the session user follows.
    pub remote_following: Mutex<BTreeSet<String>>,
    pub last_upload: Mutex<Option<MediaFile>>,
}

fn injected() -> RemoteError {
    RemoteError::Network("injected failure".into())
}

pub(crate) fn identity(id: &str, username: &str, following: &[&str]) -> Identity {
    Identity {
        id: id.into(),
        username: username.into(),
        full_name: format!("{} (full)", username),
        email: format!("{}@example.com", username),
        profile_img: None,
        following: following.iter().map(|s| s.to_string()).collect(),
        followers: BTreeSet::new(),
        created_at: None,
    }
}

pub(crate) fn summary(id: &str) -> FollowedUserSummary {
    FollowedUserSummary {
        id: id.into(),
        username: format!("user-{}", id),
        full_name: format!("User {}", id),
        profile_img: None,
    }
}

impl FakeSocialService {
    /// A service with a logged-in user and a directory of `directory` ids.
    pub fn with_user(me: Identity, directory: &[&str]) -> Self {
        let fake = Self::default();
        *fake.remote_following.lock().unwrap() = me.following.clone();
        *fake.identity.lock().unwrap() = Some(me);
        *fake.directory.lock().unwrap() = directory.iter().map(|id| summary(id)).collect();
        *fake.uploaded_url.lock().unwrap() = "https://cdn.example.com/avatar.png".into();
        fake
    }

    pub fn push_unread(&self, result: Result<u64, ()>) {
        self.unread.lock().unwrap().push_back(result);
    }

    pub fn set_posts(&self, n: usize) {
        *self.posts.lock().unwrap() = (0..n)
            .map(|i| Post { id: format!("p{}", i), text: None })
            .collect();
    }

    /// Yield until `counter` reaches `n`.
    pub async fn wait_for(counter: &AtomicUsize, n: usize) {
        while counter.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl SocialService for FakeSocialService {
    async fn current_identity(&self) -> Result<Identity, RemoteError> {
        self.calls.identity.fetch_add(1, Ordering::SeqCst);
        self.identity_gates.wait().await;
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RemoteError::Auth("no session".into()))
    }

    async fn unread_notification_count(&self) -> Result<u64, RemoteError> {
        self.calls.unread.fetch_add(1, Ordering::SeqCst);
        let scripted = self.unread.lock().unwrap().pop_front();
        self.unread_gates.wait().await;
        match scripted {
            Some(Ok(n)) => Ok(n),
            Some(Err(())) => Err(injected()),
            None => Ok(0),
        }
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        self.calls.logout.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(())
    }

    async fn follow_user(&self, user_id: &str) -> Result<(), RemoteError> {
        self.calls.follow.fetch_add(1, Ordering::SeqCst);
        if self.fail_follow.load(Ordering::SeqCst) {
            return Err(RemoteError::Server { status: 500, message: "follow failed".into() });
        }
        self.remote_following.lock().unwrap().insert(user_id.to_string());
        Ok(())
    }

    async fn unfollow_user(&self, user_id: &str) -> Result<(), RemoteError> {
        self.calls.unfollow.fetch_add(1, Ordering::SeqCst);
        if self.fail_follow.load(Ordering::SeqCst) {
            return Err(RemoteError::Server { status: 500, message: "unfollow failed".into() });
        }
        self.remote_following.lock().unwrap().remove(user_id);
        Ok(())
    }

    async fn list_all_users(&self) -> Result<Vec<FollowedUserSummary>, RemoteError> {
        self.calls.directory.fetch_add(1, Ordering::SeqCst);
        // Snapshot before waiting, like a response computed at request time.
        let snapshot = self.directory.lock().unwrap().clone();
        self.directory_gates.wait().await;
        if self.fail_directory.load(Ordering::SeqCst) {
            return Err(injected());
        }
        Ok(snapshot)
    }

    async fn user_posts(&self, _username: &str) -> Result<Vec<Post>, RemoteError> {
        self.calls.posts.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.posts.lock().unwrap().clone();
        self.posts_gates.wait().await;
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(RemoteError::Server { status: 404, message: "no such user".into() });
        }
        Ok(snapshot)
    }

    async fn upload_profile_image(&self, file: &MediaFile) -> Result<UploadedImage, RemoteError> {
        self.calls.upload.fetch_add(1, Ordering::SeqCst);
        self.upload_gates.wait().await;
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(injected());
        }
        *self.last_upload.lock().unwrap() = Some(file.clone());
        Ok(UploadedImage { image_url: self.uploaded_url.lock().unwrap().clone() })
    }
}
