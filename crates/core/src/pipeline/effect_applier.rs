use crate::capture::domain::face_image_store::FaceImageStore;
use crate::session::domain::event_sink::EventSink;
use crate::session::domain::state_machine::Effect;
use crate::store::domain::state_store::StateStore;

/// Carries out the effects of a state machine transition, in order.
///
/// Failures are logged and skipped; the next poll sees the store as it
/// actually is and the machine converges from there. Artifact deletions are
/// dropped when no image store is given (the bridge never owns images).
pub fn apply_effects<S: EventSink + ?Sized>(
    effects: Vec<Effect>,
    store: &dyn StateStore,
    images: Option<&dyn FaceImageStore>,
    sink: &mut S,
) {
    for effect in effects {
        match effect {
            Effect::Write { key, value } => {
                if let Err(e) = store.set_int(key, value) {
                    log::error!("{e}");
                }
            }
            Effect::ResetStore => {
                if let Err(e) = store.reset_all() {
                    log::error!("Store reset incomplete: {e}");
                }
            }
            Effect::Notify(event) => sink.emit(&event),
            Effect::DeleteArtifacts(paths) => match images {
                Some(images) => {
                    for path in &paths {
                        if let Err(e) = images.delete(path) {
                            log::warn!("Failed to delete {}: {e}", path.display());
                        }
                    }
                }
                None => log::debug!("No image store, keeping {} artifacts", paths.len()),
            },
        }
    }
}
