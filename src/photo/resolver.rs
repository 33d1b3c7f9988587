use parking_lot::Mutex;

use super::{Placeholder, PhotoImage, ProfileImage, MIN_IMAGE_BYTES};
use crate::generation::Generation;
use crate::upstream::{normalize_record_key, BinaryBody, Fetch, Resource, StudentIdentity, UpstreamClient};

/// Fetches the profile photo once and validates it. Any rejection becomes a
/// placeholder; callers never see a failure.
#[derive(Clone)]
pub struct ProfileImageResolver {
    client: UpstreamClient,
    min_bytes: usize,
}

fn is_image_type(media: &str) -> bool {
    media.starts_with("image/") || media == "application/octet-stream"
}

impl ProfileImageResolver {
    pub fn new(client: UpstreamClient) -> Self {
        Self {
            client,
            min_bytes: MIN_IMAGE_BYTES,
        }
    }

    pub fn with_min_bytes(mut self, min_bytes: usize) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    pub async fn resolve(
        &self,
        identity: &StudentIdentity,
        document: Option<&str>,
        name: &str,
    ) -> ProfileImage {
        let Some(document) = document.map(str::trim).filter(|d| !d.is_empty()) else {
            log::debug!("photo: no document reference, using placeholder");
            return ProfileImage::Placeholder(Placeholder::for_name(name));
        };

        let fetched = self
            .client
            .get_binary(
                Resource::ProfileImage,
                identity,
                &[("documentId", normalize_record_key(document))],
            )
            .await;

        match self.accept(fetched) {
            Some(photo) => ProfileImage::Photo(photo),
            None => ProfileImage::Placeholder(Placeholder::for_name(name)),
        }
    }

    fn accept(&self, fetched: Fetch<BinaryBody>) -> Option<PhotoImage> {
        let body = fetched.ok()?;
        let media = body.media_type();
        if !is_image_type(&media) {
            log::debug!("photo: rejecting content-type '{}'", media);
            return None;
        }
        if body.len() <= self.min_bytes {
            log::debug!("photo: rejecting {}-byte body as a stub", body.len());
            return None;
        }
        // Octet streams from the blob store are JPEGs in practice.
        let content_type = if media.starts_with("image/") {
            media
        } else {
            "image/jpeg".to_string()
        };
        Some(PhotoImage {
            content_type,
            bytes: body.bytes,
        })
    }
}

/// Owns the resolved image for one mounted view. `unmount` revokes any
/// resolution still in flight and releases the image; dropping the slot
/// does the same.
pub struct PhotoSlot {
    resolver: ProfileImageResolver,
    generation: Generation,
    image: Mutex<Option<ProfileImage>>,
}

impl PhotoSlot {
    pub fn new(resolver: ProfileImageResolver) -> Self {
        Self {
            resolver,
            generation: Generation::new(),
            image: Mutex::new(None),
        }
    }

    /// Resolve and hold the image. `None` if the slot was unmounted or a
    /// newer load started while this one was in flight.
    pub async fn load(
        &self,
        identity: &StudentIdentity,
        document: Option<&str>,
        name: &str,
    ) -> Option<ProfileImage> {
        let ticket = self.generation.begin();
        let image = self.resolver.resolve(identity, document, name).await;
        if !ticket.is_current() {
            log::debug!("photo: discarding revoked resolution {}", ticket.id());
            return None;
        }
        *self.image.lock() = Some(image.clone());
        Some(image)
    }

    pub fn current(&self) -> Option<ProfileImage> {
        self.image.lock().clone()
    }

    pub fn unmount(&self) {
        self.generation.invalidate();
        if self.image.lock().take().is_some() {
            log::debug!("photo: released image");
        }
    }
}

impl Drop for PhotoSlot {
    fn drop(&mut self) {
        self.unmount();
    }
}
