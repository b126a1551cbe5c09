//! Typed caller-facing API over the request registry.
//!
//! Every call submits immediately and returns a [`Reply`] future. Replies
//! never fail: a rejected submission, an abandoned request, or a payload of
//! the wrong shape all resolve to the type's default value.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use super::dispatcher::{DrainBudget, DrainReport, ResponseDispatcher};
use super::registry::{PendingRequest, RequestRegistry};
use crate::service::{
    ArtObjectId, ImageSize, NULL_REQUEST_ID, NativeService, ObjectRecord, RequestId, RequestKind,
    ResponseBody, to_optional_filter,
};

/// Typed view of a pending request.
pub struct Reply<T> {
    request: PendingRequest,
    extract: fn(ResponseBody) -> Option<T>,
}

impl<T> Reply<T> {
    fn new(request: PendingRequest, extract: fn(ResponseBody) -> Option<T>) -> Self {
        Self { request, extract }
    }

    /// Id of the underlying request (0 if submission failed).
    pub fn request_id(&self) -> RequestId {
        self.request.id()
    }

    /// Whether the payload is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.request.is_pending()
    }
}

impl<T: Default> Future for Reply<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let Some(body) = ready!(Pin::new(&mut self.request).poll(cx)) else {
            return Poll::Ready(T::default());
        };
        let shape = body.shape();
        match (self.extract)(body) {
            Some(value) => Poll::Ready(value),
            None => {
                log::error!(
                    "Response to {} request {} has unexpected {} payload",
                    self.request.kind(),
                    self.request.id(),
                    shape
                );
                Poll::Ready(T::default())
            }
        }
    }
}

fn extract_image(body: ResponseBody) -> Option<Option<PathBuf>> {
    match body {
        ResponseBody::Image(path) => Some(path),
        _ => None,
    }
}

fn extract_objects(body: ResponseBody) -> Option<Vec<ObjectRecord>> {
    match body {
        ResponseBody::Objects(objects) => Some(objects),
        _ => None,
    }
}

fn extract_integer(body: ResponseBody) -> Option<i64> {
    match body {
        ResponseBody::Integer(value) => Some(value),
        _ => None,
    }
}

fn extract_json(body: ResponseBody) -> Option<String> {
    match body {
        ResponseBody::Json(json) => Some(json),
        _ => None,
    }
}

fn extract_ack(body: ResponseBody) -> Option<bool> {
    match body {
        ResponseBody::Empty => Some(true),
        _ => None,
    }
}

/// Frame-loop client of the gallery data service.
pub struct GalleryClient<S: NativeService> {
    service: S,
    registry: RequestRegistry,
    dispatcher: ResponseDispatcher,
}

impl<S: NativeService> GalleryClient<S> {
    /// Wrap `service` with an empty registry.
    pub fn new(service: S, budget: DrainBudget) -> Self {
        Self {
            service,
            registry: RequestRegistry::new(),
            dispatcher: ResponseDispatcher::new(budget),
        }
    }

    /// The wrapped service.
    pub fn service(&self) -> &S {
        &self.service
    }

    /// The wrapped service, mutably.
    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    /// The in-flight request table.
    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    /// Submit a raw request and register it.
    pub fn begin(&mut self, kind: RequestKind) -> PendingRequest {
        self.registry.begin(&mut self.service, kind)
    }

    /// Run this frame's dispatch step.
    pub fn drain_one_frame(&mut self) -> DrainReport {
        self.dispatcher
            .drain_one_frame(&mut self.service, &mut self.registry)
    }

    /// Path of the cached image file for `object_id`, if the service has one.
    pub fn fetch_image(&mut self, object_id: ArtObjectId, size: ImageSize) -> Reply<Option<PathBuf>> {
        let request = self.begin(RequestKind::FetchImage { object_id, size });
        Reply::new(request, extract_image)
    }

    /// Art objects hung on one wall of a gallery.
    pub fn query_objects_for_wall(
        &mut self,
        gallery_id: i64,
        wall_id: &str,
    ) -> Reply<Vec<ObjectRecord>> {
        let request = self.begin(RequestKind::ObjectsForWall {
            gallery_id,
            wall_id: wall_id.to_string(),
        });
        Reply::new(request, extract_objects)
    }

    /// Number of art objects matching `filter` (empty means all).
    pub fn count_objects(&mut self, filter: &str) -> Reply<i64> {
        let request = self.begin(RequestKind::CountObjects {
            filter: to_optional_filter(filter),
        });
        Reply::new(request, extract_integer)
    }

    /// Rebuild the gallery layout. Resolves to `true` once acknowledged.
    pub fn run_layout(&mut self, walls_json: String, filter: &str, dense: bool) -> Reply<bool> {
        let request = self.begin(RequestKind::Layout {
            walls_json,
            filter: to_optional_filter(filter),
            dense,
        });
        Reply::new(request, extract_ack)
    }

    /// Bring the service's storage up to date. Resolves to `true` once acknowledged.
    pub fn migrate(&mut self) -> Reply<bool> {
        let request = self.begin(RequestKind::Migrate);
        Reply::new(request, extract_ack)
    }

    /// Replace the hand-arranged placements (galleries with non-positive ids)
    /// with `json_content`. Resolves to `true` once acknowledged.
    pub fn import_non_positive_layout(&mut self, json_content: String) -> Reply<bool> {
        let request = self.begin(RequestKind::ImportNonPositiveLayout { json_content });
        Reply::new(request, extract_ack)
    }

    /// Hand-arranged placements as JSON; empty if the service did not answer.
    pub fn export_non_positive_layout(&mut self) -> Reply<String> {
        let request = self.begin(RequestKind::ExportNonPositiveLayout);
        Reply::new(request, extract_json)
    }

    /// Move an art object on a wall. Fire-and-forget; returns whether it was sent.
    pub fn move_art_object(
        &mut self,
        object_id: ArtObjectId,
        gallery_id: i64,
        wall_id: &str,
        x: f64,
        y: f64,
    ) -> bool {
        let id = self.service.submit(RequestKind::MoveArtObject {
            object_id,
            gallery_id,
            wall_id: wall_id.to_string(),
            x,
            y,
        });
        if id == NULL_REQUEST_ID {
            log::warn!("Moving {} failed to submit", object_id);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testing::ScriptedService;
    use std::task::Waker;

    fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
        let mut cx = Context::from_waker(Waker::noop());
        Pin::new(future).poll(&mut cx)
    }

    fn client() -> GalleryClient<ScriptedService> {
        GalleryClient::new(ScriptedService::new(), DrainBudget::default())
    }

    #[test]
    fn test_fetch_image_example_scenario() {
        let mut client = client();
        client.service_mut().next_id = 7;
        let mut reply = client.fetch_image(ArtObjectId::Met(42), ImageSize::Small);
        assert_eq!(reply.request_id(), 7);
        assert_eq!(
            client.service().submitted[0].1,
            RequestKind::FetchImage {
                object_id: ArtObjectId::Met(42),
                size: ImageSize::Small,
            }
        );

        client
            .service_mut()
            .respond(7, ResponseBody::Image(Some(PathBuf::from("/cache/42.png"))));
        assert!(poll_once(&mut reply).is_pending());
        client.drain_one_frame();
        assert_eq!(
            poll_once(&mut reply),
            Poll::Ready(Some(PathBuf::from("/cache/42.png")))
        );
        assert!(client.registry().is_empty());
    }

    #[test]
    fn test_failed_submission_yields_defaults() {
        let mut client = client();
        client.service_mut().reject_submissions = true;

        let mut count = client.count_objects("");
        let mut objects = client.query_objects_for_wall(1, "north");
        assert!(client.registry().is_empty());

        assert!(poll_once(&mut count).is_pending());
        assert_eq!(poll_once(&mut count), Poll::Ready(0));
        assert!(poll_once(&mut objects).is_pending());
        assert_eq!(poll_once(&mut objects), Poll::Ready(Vec::new()));
    }

    #[test]
    fn test_wrong_payload_shape_yields_default() {
        let mut client = client();
        let mut layout = client.run_layout("[]".to_string(), "", true);
        client
            .service_mut()
            .respond(layout.request_id(), ResponseBody::Integer(3));
        client.drain_one_frame();
        assert_eq!(poll_once(&mut layout), Poll::Ready(false));
    }

    #[test]
    fn test_empty_filter_is_sent_as_none() {
        let mut client = client();
        let _count = client.count_objects("");
        let _layout = client.run_layout("[]".to_string(), "collection:met", false);
        let submitted = &client.service().submitted;
        assert_eq!(submitted[0].1, RequestKind::CountObjects { filter: None });
        assert_eq!(
            submitted[1].1,
            RequestKind::Layout {
                walls_json: "[]".to_string(),
                filter: Some("collection:met".to_string()),
                dense: false,
            }
        );
    }

    #[test]
    fn test_move_is_not_registered() {
        let mut client = client();
        assert!(client.move_art_object(ArtObjectId::Wikidata(5), 1, "west", 1.0, 2.0));
        assert!(client.registry().is_empty());
        assert_eq!(client.service().submitted.len(), 1);

        client.service_mut().reject_submissions = true;
        assert!(!client.move_art_object(ArtObjectId::Wikidata(5), 1, "west", 1.0, 2.0));
    }

    #[test]
    fn test_count_and_ack() {
        let mut client = client();
        let mut count = client.count_objects("artist:Hokusai");
        let mut migrate = client.migrate();
        client
            .service_mut()
            .respond(count.request_id(), ResponseBody::Integer(41));
        client
            .service_mut()
            .respond(migrate.request_id(), ResponseBody::Empty);
        let report = client.drain_one_frame();
        assert_eq!(report.dispatched, 2);
        assert_eq!(poll_once(&mut count), Poll::Ready(41));
        assert_eq!(poll_once(&mut migrate), Poll::Ready(true));
    }

    #[test]
    fn test_non_positive_layout_import_and_export() {
        let mut client = client();
        let layout = r#"[{"gallery_id":0,"wall_id":"north"}]"#;
        let mut import = client.import_non_positive_layout(layout.to_string());
        let mut export = client.export_non_positive_layout();
        let mut unanswered = client.export_non_positive_layout();
        assert_eq!(
            client.service().submitted[0].1,
            RequestKind::ImportNonPositiveLayout {
                json_content: layout.to_string(),
            }
        );

        client
            .service_mut()
            .respond(import.request_id(), ResponseBody::Empty);
        client
            .service_mut()
            .respond(export.request_id(), ResponseBody::Json(layout.to_string()));
        client
            .service_mut()
            .respond(unanswered.request_id(), ResponseBody::Empty);
        client.drain_one_frame();

        assert_eq!(poll_once(&mut import), Poll::Ready(true));
        assert_eq!(poll_once(&mut export), Poll::Ready(layout.to_string()));
        assert_eq!(poll_once(&mut unanswered), Poll::Ready(String::new()));
    }
}
