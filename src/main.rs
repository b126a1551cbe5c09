//! Demo frame loop for the gallery bridge.
//!
//! Serves a directory of `<collection>-<number>-<size>.png` images (for
//! example `met-42-small.png`) through a threaded data service, loads every
//! object on the first wall at small size, then upgrades each one in turn
//! so the large image cache has to evict.
//!
//! Usage: `gallery-bridge-demo [IMAGE_DIR]`. Without a directory, a few
//! images are generated in the temp directory.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use gallery_bridge::bridge::ClientHandle;
use gallery_bridge::cache::Registration;
use gallery_bridge::service::{ArtObjectId, ImageSize, ObjectRecord, RequestKind, ResponseBody};
use gallery_bridge::{
    BridgeConfig, DecodeSource, DecodedImage, DecoderHandle, GalleryBridge, HolderId, ImageHolder,
    LargeImageCache, RequestHandler, ServiceError, ThreadedService,
};

const FRAME_TIME: Duration = Duration::from_millis(16);
const MAX_FRAMES: u64 = 600;
const GALLERY_ID: i64 = 1;
const WALLS: [&str; 4] = ["north", "east", "south", "west"];

/// Serves art objects from image files in one directory.
struct DirectoryHandler {
    root: PathBuf,
    objects: Vec<ObjectRecord>,
    manual_layout: String,
}

impl DirectoryHandler {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            objects: Vec::new(),
            manual_layout: "[]".to_string(),
        }
    }

    fn image_path(&self, object_id: ArtObjectId, size: ImageSize) -> PathBuf {
        let stem = match object_id {
            ArtObjectId::Met(id) => format!("met-{id}"),
            ArtObjectId::Wikidata(qid) => format!("q-{qid}"),
        };
        self.root.join(format!("{stem}-{size}.png"))
    }

    fn matches(record: &ObjectRecord, filter: Option<&str>) -> bool {
        filter.is_none_or(|filter| record.title.contains(filter) || record.collection == filter)
    }
}

/// Parse `met-42-small.png` into an object id.
fn parse_object_file(name: &str) -> Option<ArtObjectId> {
    let stem = name.strip_suffix("-small.png")?;
    let (collection, number) = stem.split_once('-')?;
    let number = number.parse().ok()?;
    match collection {
        "met" => Some(ArtObjectId::Met(number)),
        "q" => Some(ArtObjectId::Wikidata(number)),
        _ => None,
    }
}

impl RequestHandler for DirectoryHandler {
    fn start(&mut self) -> Result<(), ServiceError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            ServiceError::backend(format!("cannot read {}: {}", self.root.display(), e))
        })?;
        let mut ids: Vec<ArtObjectId> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_object_file(&entry.file_name().to_string_lossy()))
            .collect();
        ids.sort_by_key(|id| id.to_string());

        self.objects = ids
            .into_iter()
            .enumerate()
            .map(|(index, object_id)| ObjectRecord {
                object_id,
                title: object_id.to_string(),
                artist: "Unknown".to_string(),
                medium: "Digital image".to_string(),
                date: String::new(),
                collection: match object_id {
                    ArtObjectId::Met(_) => "met".to_string(),
                    ArtObjectId::Wikidata(_) => "wikidata".to_string(),
                },
                width: 1.0,
                height: 1.0,
                x: (index / WALLS.len()) as f64 * 1.5,
                y: 1.5,
            })
            .collect();
        log::info!(
            "Serving {} objects from {}",
            self.objects.len(),
            self.root.display()
        );
        Ok(())
    }

    fn handle(&mut self, request: RequestKind) -> Result<Option<ResponseBody>, ServiceError> {
        let body = match request {
            RequestKind::FetchImage { object_id, size } => {
                let path = self.image_path(object_id, size);
                ResponseBody::Image(path.exists().then_some(path))
            }
            RequestKind::CountObjects { filter } => {
                let count = self
                    .objects
                    .iter()
                    .filter(|record| Self::matches(record, filter.as_deref()))
                    .count();
                ResponseBody::Integer(count as i64)
            }
            RequestKind::ObjectsForWall { wall_id, .. } => {
                let Some(wall) = WALLS.iter().position(|wall| *wall == wall_id) else {
                    return Ok(Some(ResponseBody::Objects(Vec::new())));
                };
                let objects = self
                    .objects
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| index % WALLS.len() == wall)
                    .map(|(_, record)| record.clone())
                    .collect();
                ResponseBody::Objects(objects)
            }
            RequestKind::Layout {
                walls_json,
                filter,
                dense,
            } => {
                let walls: Vec<String> = serde_json::from_str(&walls_json)?;
                let spacing = if dense { 1.1 } else { 1.5 };
                let mut placed = 0;
                for record in &mut self.objects {
                    if Self::matches(record, filter.as_deref()) {
                        record.x = placed as f64 * spacing;
                        placed += 1;
                    }
                }
                log::debug!("Laid out {} objects over {} walls", placed, walls.len());
                ResponseBody::Empty
            }
            RequestKind::MoveArtObject { object_id, x, y, .. } => {
                if let Some(record) = self
                    .objects
                    .iter_mut()
                    .find(|record| record.object_id == object_id)
                {
                    record.x = x;
                    record.y = y;
                }
                return Ok(None);
            }
            RequestKind::Migrate => ResponseBody::Empty,
            RequestKind::ImportNonPositiveLayout { json_content } => {
                serde_json::from_str::<serde_json::Value>(&json_content)?;
                self.manual_layout = json_content;
                ResponseBody::Empty
            }
            RequestKind::ExportNonPositiveLayout => ResponseBody::Json(self.manual_layout.clone()),
        };
        Ok(Some(body))
    }
}

/// A painting on the wall: always has a small image, sometimes a large one.
struct Painting {
    object_id: ArtObjectId,
    small: Option<(u32, u32)>,
    large: Option<(u32, u32)>,
}

impl ImageHolder for Painting {
    type Image = DecodedImage;

    fn install_large_image(&mut self, image: DecodedImage) {
        log::info!("{} now shows {}x{}", self.object_id, image.width, image.height);
        self.large = Some((image.width, image.height));
    }

    fn downgrade(&mut self) {
        log::info!("{} reverted to its small image", self.object_id);
        self.large = None;
    }
}

type Wall = Rc<RefCell<HashMap<HolderId, Painting>>>;

async fn fetch_and_decode(
    client: &ClientHandle<ThreadedService>,
    decoder: &DecoderHandle,
    object_id: ArtObjectId,
    size: ImageSize,
) -> Option<DecodedImage> {
    let path = client.fetch_image(object_id, size).await?;
    decoder.decode(DecodeSource::Path(path)).await
}

async fn visit_gallery(
    client: ClientHandle<ThreadedService>,
    decoder: DecoderHandle,
    wall: Wall,
    large_images: Rc<RefCell<LargeImageCache>>,
) {
    if !client.migrate().await {
        log::warn!("Migration was not acknowledged");
    }
    let total = client.count_objects("").await;
    log::info!("Gallery holds {} objects", total);

    let manual_layout = client.export_non_positive_layout().await;
    let walls_json = serde_json::to_string(&WALLS).unwrap_or_default();
    client.run_layout(walls_json, "", false).await;
    if !client.import_non_positive_layout(manual_layout).await {
        log::warn!("Hand-arranged walls were not restored");
    }

    let objects = client.query_objects_for_wall(GALLERY_ID, WALLS[0]).await;
    for (index, record) in objects.iter().enumerate() {
        let id = HolderId(index as u64);
        let small = fetch_and_decode(&client, &decoder, record.object_id, ImageSize::Small).await;
        wall.borrow_mut().insert(
            id,
            Painting {
                object_id: record.object_id,
                small: small.map(|image| (image.width, image.height)),
                large: None,
            },
        );
    }

    for (index, record) in objects.iter().enumerate() {
        let id = HolderId(index as u64);
        client.move_art_object(record.object_id, GALLERY_ID, WALLS[0], record.x, 1.0);
        let Some(image) = fetch_and_decode(&client, &decoder, record.object_id, ImageSize::Large).await
        else {
            log::warn!("No large image for {}", record.object_id);
            continue;
        };
        let outcome = large_images
            .borrow_mut()
            .register(&mut *wall.borrow_mut(), id, image);
        if let Registration::Installed {
            evicted: Some(eviction),
        } = outcome
        {
            log::info!("Upgrading {} evicted holder {:?}", record.object_id, eviction);
        }
    }
}

/// Write a few demo images and return their directory.
fn generate_demo_images() -> Result<PathBuf, image::ImageError> {
    let root = std::env::temp_dir().join("gallery-bridge-demo");
    fs::create_dir_all(&root)?;
    for number in 1..=28 {
        write_demo_image(&root, &format!("met-{number}-small.png"), 32, number)?;
        write_demo_image(&root, &format!("met-{number}-large.png"), 512, number)?;
    }
    Ok(root)
}

fn write_demo_image(root: &Path, name: &str, size: u32, seed: u32) -> Result<(), image::ImageError> {
    let img = image::RgbaImage::from_fn(size, size, |x, y| {
        let shade = ((x + y + seed * 17) % 256) as u8;
        image::Rgba([shade, seed.wrapping_mul(40) as u8, 255 - shade, 255])
    });
    img.save(root.join(name))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = BridgeConfig::load_from_default_path().unwrap_or_default();
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let root = match std::env::args().nth(1).map(PathBuf::from) {
        Some(root) => root,
        None => match &config.data_root {
            Some(root) => root.clone(),
            None => generate_demo_images()?,
        },
    };

    let service = ThreadedService::connect(DirectoryHandler::new(root))?;
    let mut bridge = GalleryBridge::new(service, &config);
    bridge.set_fatal_reporter(|message| eprintln!("Gallery service failed: {message}"));

    let wall: Wall = Rc::new(RefCell::new(HashMap::new()));
    let large_images = Rc::new(RefCell::new(LargeImageCache::new(config.large_image_capacity)));
    bridge.spawn(visit_gallery(
        bridge.client(),
        bridge.decoder(),
        Rc::clone(&wall),
        Rc::clone(&large_images),
    ));

    let mut frames = 0;
    while !bridge.is_idle() && frames < MAX_FRAMES {
        let report = bridge.tick();
        frames = report.frame;
        if report.drain.is_fatal() {
            break;
        }
        std::thread::sleep(FRAME_TIME);
    }
    bridge.shutdown();

    let wall = wall.borrow();
    let with_small = wall.values().filter(|painting| painting.small.is_some()).count();
    let with_large = wall.values().filter(|painting| painting.large.is_some()).count();
    log::info!(
        "Finished after {} frames: {} paintings, {} with small images, {} large ({:?})",
        frames,
        wall.len(),
        with_small,
        with_large,
        large_images.borrow().holders().collect::<Vec<_>>()
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
