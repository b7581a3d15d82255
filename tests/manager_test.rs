use anyhow::Result;
use async_trait::async_trait;
use orm_manager::config::ManagerConfig;
use orm_manager::constants::analyzer_cache_key;
use orm_manager::infra::{MemoryCacheBackend, MemoryEngine, MemoryGateway, MemoryStore, MetadataRegistry};
use orm_manager::{
    Config, Entity, EntityAnalyzer, EntityId, EntityMetadata, EntityModel, EntityProxy, EngineRegistry,
    Gateway, GatewayEngine, GatewayState, Manager, ManagerHandle, OrmError, Record, RelationMetadata,
    SortOrder,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Venue {
    id: String,
    name: String,
    city: String,
    capacity: u32,
}

impl EntityModel for Venue {
    const ENTITY_TYPE: &'static str = "App\\Venue";

    fn key(&self) -> Option<EntityId> {
        Some(EntityId::from(self.id.as_str()))
    }

    fn relations() -> Vec<RelationMetadata> {
        vec![RelationMetadata::new("events", "App\\Event")]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    id: String,
    title: String,
    venue_id: String,
    #[serde(skip)]
    venue: Option<Venue>,
}

impl EntityModel for Event {
    const ENTITY_TYPE: &'static str = "\\App\\Event";

    fn key(&self) -> Option<EntityId> {
        Some(EntityId::from(self.id.as_str()))
    }

    fn relations() -> Vec<RelationMetadata> {
        vec![RelationMetadata::new("venue", "App\\Venue")]
    }

    fn related_entities(&self) -> Vec<&dyn Entity> {
        self.venue.iter().map(|venue| venue as &dyn Entity).collect()
    }
}

/// Standalone entity with no relations, persisted through `archive` engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ticket {
    id: String,
    seat: String,
}

impl EntityModel for Ticket {
    const ENTITY_TYPE: &'static str = "App\\Ticket";
    const GATEWAY: &'static str = "archive";

    fn key(&self) -> Option<EntityId> {
        Some(EntityId::from(self.id.as_str()))
    }
}

fn venue(id: &str, name: &str, city: &str, capacity: u32) -> Venue {
    Venue {
        id: id.to_string(),
        name: name.to_string(),
        city: city.to_string(),
        capacity,
    }
}

fn registry() -> MetadataRegistry {
    let registry = MetadataRegistry::new();
    registry.register::<Venue>().register::<Event>().register::<Ticket>();
    registry
}

fn manager_with(store: &MemoryStore) -> Result<Arc<Manager>> {
    Ok(Manager::from_config(&Config::default(), registry(), store.clone())?)
}

fn manager() -> Result<Arc<Manager>> {
    manager_with(&MemoryStore::new())
}

/// Memory engine that counts how many gateways it built.
struct CountingEngine {
    inner: MemoryEngine,
    builds: AtomicUsize,
}

impl CountingEngine {
    fn new(store: MemoryStore) -> Self {
        Self {
            inner: MemoryEngine::new(store),
            builds: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GatewayEngine for CountingEngine {
    fn name(&self) -> &str {
        "counting"
    }

    async fn build(&self, manager: ManagerHandle, analyzer: EntityAnalyzer) -> orm_manager::Result<Arc<dyn Gateway>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build(manager, analyzer).await
    }
}

/// Engine whose gateways ask for their own type before publishing a link.
struct EagerEngine;

#[async_trait]
impl GatewayEngine for EagerEngine {
    fn name(&self) -> &str {
        "eager"
    }

    async fn build(&self, manager: ManagerHandle, analyzer: EntityAnalyzer) -> orm_manager::Result<Arc<dyn Gateway>> {
        manager.upgrade()?.get_gateway(analyzer.entity_type()).await
    }
}

struct NamelessEngine;

#[async_trait]
impl GatewayEngine for NamelessEngine {
    fn name(&self) -> &str {
        " "
    }

    async fn build(&self, _manager: ManagerHandle, _analyzer: EntityAnalyzer) -> orm_manager::Result<Arc<dyn Gateway>> {
        Err(OrmError::Config("never built".to_string()))
    }
}

#[tokio::test]
async fn test_get_gateway_returns_same_instance() -> Result<()> {
    let manager = manager()?;

    let first = manager.get_gateway("App\\Venue").await?;
    let second = manager.get_gateway("\\App\\Venue").await?;
    let third = manager.get_gateway("\\\\App\\Venue").await?;

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(first.entity_type().as_str(), "App\\Venue");
    assert_eq!(manager.gateway_state("\\App\\Venue"), GatewayState::Ready);
    Ok(())
}

#[tokio::test]
async fn test_missing_engine_is_gateway_not_found() -> Result<()> {
    let manager = manager()?;

    let result = manager.get_gateway("App\\Ticket").await;
    match result {
        Err(OrmError::GatewayNotFound { entity_type, reason }) => {
            assert_eq!(entity_type, "App\\Ticket");
            assert!(reason.contains("archive"));
        }
        other => panic!("expected GatewayNotFound, got {:?}", other.map(|g| g.entity_type().clone())),
    }
    assert_eq!(manager.gateway_state("App\\Ticket"), GatewayState::Unresolved);
    Ok(())
}

#[tokio::test]
async fn test_unknown_entity_type() -> Result<()> {
    let manager = manager()?;
    assert!(matches!(
        manager.get_gateway("App\\Ghost").await,
        Err(OrmError::UnknownEntity(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_add_engine_validates_and_enables_resolution() -> Result<()> {
    let store = MemoryStore::new();
    let manager = manager_with(&store)?;

    assert!(matches!(
        manager.add_engine("", Arc::new(CountingEngine::new(store.clone()))),
        Err(OrmError::InvalidEngineArgument(_))
    ));
    assert!(matches!(
        manager.add_engine("archive", Arc::new(NamelessEngine)),
        Err(OrmError::InvalidEngineArgument(_))
    ));
    assert!(manager.get_gateway("App\\Ticket").await.is_err());

    let engine = Arc::new(CountingEngine::new(store.clone()));
    manager.add_engine("archive", engine.clone())?;
    assert_eq!(manager.engine_codes(), vec!["archive".to_string(), "memory".to_string()]);

    let ticket = Ticket {
        id: "t1".to_string(),
        seat: "A12".to_string(),
    };
    manager.save_one(&ticket, false).await?;
    manager.get_gateway("App\\Ticket").await?;

    assert_eq!(engine.builds.load(Ordering::SeqCst), 1);
    assert_eq!(manager.find::<Ticket>("t1").await?, Some(ticket));
    assert_eq!(store.count("ticket"), 1);
    Ok(())
}

#[tokio::test]
async fn test_circular_relations_resolve_through_links() -> Result<()> {
    let manager = manager()?;

    let events = manager.get_gateway("App\\Event").await?;
    assert_eq!(manager.gateway_state("App\\Event"), GatewayState::Ready);
    assert_eq!(manager.gateway_state("App\\Venue"), GatewayState::Ready);

    let venues = manager.get_gateway("App\\Venue").await?;
    let venue_of_event = events.relation("venue").expect("venue relation wired");
    let events_of_venue = venues.relation("events").expect("events relation wired");

    assert!(Arc::ptr_eq(&venue_of_event, &venues));
    assert!(Arc::ptr_eq(&events_of_venue, &events));
    assert_eq!(manager.realized_types().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_self_request_without_link_is_a_cycle() -> Result<()> {
    let manager = manager()?;
    manager.add_engine("archive", Arc::new(EagerEngine))?;

    assert!(matches!(
        manager.get_gateway("App\\Ticket").await,
        Err(OrmError::ResolutionCycle(_))
    ));
    // The failed construction is rolled back.
    assert_eq!(manager.gateway_state("App\\Ticket"), GatewayState::Unresolved);
    assert!(matches!(
        manager.get_gateway("App\\Ticket").await,
        Err(OrmError::ResolutionCycle(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_set_gateway_link_is_ignored_once_ready() -> Result<()> {
    let manager = manager()?;
    let real = manager.get_gateway("App\\Venue").await?;

    let other_manager = self::manager()?;
    let impostor = other_manager.get_gateway("App\\Venue").await?;
    assert!(!Arc::ptr_eq(&real, &impostor));

    manager.set_gateway_link("App\\Venue", &impostor);

    assert_eq!(manager.gateway_state("App\\Venue"), GatewayState::Ready);
    assert!(Arc::ptr_eq(&manager.get_gateway("App\\Venue").await?, &real));
    Ok(())
}

#[tokio::test]
async fn test_save_with_relations_saves_related_entities() -> Result<()> {
    let manager = manager()?;
    let neumos = venue("v1", "Neumos", "Seattle", 650);
    let event = Event {
        id: "e1".to_string(),
        title: "Sunday Jazz".to_string(),
        venue_id: "v1".to_string(),
        venue: Some(neumos.clone()),
    };

    manager.save([&event as &dyn Entity], true).await?;

    let stored = manager.find::<Event>("e1").await?.expect("event saved");
    assert_eq!(stored.title, "Sunday Jazz");
    assert_eq!(stored.venue, None);
    assert_eq!(manager.find::<Venue>("v1").await?, Some(neumos));
    Ok(())
}

#[tokio::test]
async fn test_save_without_relations_skips_related_entities() -> Result<()> {
    let manager = manager()?;
    let event = Event {
        id: "e1".to_string(),
        title: "Sunday Jazz".to_string(),
        venue_id: "v1".to_string(),
        venue: Some(venue("v1", "Neumos", "Seattle", 650)),
    };

    manager.save_one(&event, false).await?;

    assert!(manager.find::<Event>("e1").await?.is_some());
    assert_eq!(manager.find::<Venue>("v1").await?, None);
    Ok(())
}

#[tokio::test]
async fn test_save_any_stops_at_first_non_entity() -> Result<()> {
    let manager = manager()?;
    let neumos = venue("v1", "Neumos", "Seattle", 650);
    let barboza = venue("v2", "Barboza", "Seattle", 200);
    let not_an_entity = "not-an-entity";

    let items: Vec<&(dyn Any + Send + Sync)> = vec![&neumos, &not_an_entity, &barboza];
    let result = manager.save_any(items, false).await;

    assert!(matches!(result, Err(OrmError::InvalidEntity { position: 1, .. })));
    assert_eq!(manager.find::<Venue>("v1").await?, Some(neumos));
    assert_eq!(manager.find::<Venue>("v2").await?, None);
    Ok(())
}

#[tokio::test]
async fn test_save_any_accepts_records_and_models() -> Result<()> {
    let manager = manager()?;
    let neumos = venue("v1", "Neumos", "Seattle", 650);
    let record = Record::from_model(&venue("v2", "Barboza", "Seattle", 200))?;

    let items: Vec<&(dyn Any + Send + Sync)> = vec![&neumos, &record];
    manager.save_any(items, false).await?;

    assert!(manager.get_by_id("App\\Venue", "v2").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_remove_and_remove_any() -> Result<()> {
    let store = MemoryStore::new();
    let manager = manager_with(&store)?;
    let neumos = venue("v1", "Neumos", "Seattle", 650);
    let barboza = venue("v2", "Barboza", "Seattle", 200);
    manager.save([&neumos as &dyn Entity, &barboza], false).await?;
    assert_eq!(store.count("venue"), 2);

    manager.remove([&neumos as &dyn Entity]).await?;
    assert_eq!(manager.find::<Venue>("v1").await?, None);

    let bogus = 7u8;
    let items: Vec<&(dyn Any + Send + Sync)> = vec![&bogus, &barboza];
    assert!(matches!(
        manager.remove_any(items).await,
        Err(OrmError::InvalidEntity { position: 0, .. })
    ));
    assert_eq!(store.count("venue"), 1);

    let items: Vec<&(dyn Any + Send + Sync)> = vec![&barboza];
    manager.remove_any(items).await?;
    assert_eq!(store.count("venue"), 0);
    Ok(())
}

async fn venue_name(manager: &Manager, id: &str) -> Result<Option<String>> {
    Ok(manager.find::<Venue>(id).await?.map(|v| v.name))
}

async fn event_title(manager: &Manager, id: &str) -> Result<Option<String>> {
    Ok(manager.find::<Event>(id).await?.map(|e| e.title))
}

fn event(id: &str, title: &str, venue_id: &str) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        venue_id: venue_id.to_string(),
        venue: None,
    }
}

/// Overwrite stored rows directly, bypassing the gateways and their identity maps.
fn rewrite_behind_gateways(store: &MemoryStore, new_name: &str, new_title: &str) -> Result<()> {
    store.put(
        "venue",
        EntityId::from("v1"),
        Record::from_model(&venue("v1", new_name, "Seattle", 650))?,
    );
    store.put(
        "event",
        EntityId::from("e1"),
        Record::from_model(&event("e1", new_title, "v1"))?,
    );
    Ok(())
}

#[tokio::test]
async fn test_refresh_all_refreshes_every_built_gateway_and_builds_none() -> Result<()> {
    let store = MemoryStore::new();
    let manager = manager_with(&store)?;
    manager.add_engine("archive", Arc::new(CountingEngine::new(store.clone())))?;

    manager.save_one(&venue("v1", "Neumos", "Seattle", 650), false).await?;
    manager.save_one(&event("e1", "Sunday Jazz", "v1"), false).await?;
    assert_eq!(venue_name(&manager, "v1").await?.as_deref(), Some("Neumos"));
    assert_eq!(event_title(&manager, "e1").await?.as_deref(), Some("Sunday Jazz"));
    let before = manager.realized_types();

    rewrite_behind_gateways(&store, "Neumos Renamed", "Monday Jazz")?;
    assert_eq!(venue_name(&manager, "v1").await?.as_deref(), Some("Neumos"));
    assert_eq!(event_title(&manager, "e1").await?.as_deref(), Some("Sunday Jazz"));

    manager.refresh(None).await?;

    assert_eq!(venue_name(&manager, "v1").await?.as_deref(), Some("Neumos Renamed"));
    assert_eq!(event_title(&manager, "e1").await?.as_deref(), Some("Monday Jazz"));
    assert_eq!(manager.realized_types(), before);
    assert_eq!(manager.gateway_state("App\\Ticket"), GatewayState::Unresolved);
    Ok(())
}

#[tokio::test]
async fn test_refresh_one_type_leaves_other_gateways_alone() -> Result<()> {
    let store = MemoryStore::new();
    let manager = manager_with(&store)?;
    manager.add_engine("archive", Arc::new(CountingEngine::new(store.clone())))?;

    manager.save_one(&venue("v1", "Neumos", "Seattle", 650), false).await?;
    manager.save_one(&event("e1", "Sunday Jazz", "v1"), false).await?;
    venue_name(&manager, "v1").await?;
    event_title(&manager, "e1").await?;

    rewrite_behind_gateways(&store, "Neumos Renamed", "Monday Jazz")?;
    manager.refresh(Some("\\App\\Venue")).await?;

    assert_eq!(venue_name(&manager, "v1").await?.as_deref(), Some("Neumos Renamed"));
    // Event was not refreshed, so its loaded copy still wins.
    assert_eq!(event_title(&manager, "e1").await?.as_deref(), Some("Sunday Jazz"));

    manager.refresh(Some("App\\Ticket")).await?;
    assert_eq!(manager.gateway_state("App\\Ticket"), GatewayState::Ready);
    assert_eq!(event_title(&manager, "e1").await?.as_deref(), Some("Sunday Jazz"));
    Ok(())
}

#[tokio::test]
async fn test_proxy_loads_lazily() -> Result<()> {
    let manager = manager()?;
    let neumos = venue("v1", "Neumos", "Seattle", 650);
    manager.save_one(&neumos, false).await?;

    let proxy = manager.create_proxy("App\\Venue", "v1").await?;
    assert_eq!(proxy.id(), Some(EntityId::from("v1")));

    let proxy = proxy
        .as_any()
        .downcast_ref::<EntityProxy>()
        .expect("memory gateways hand out EntityProxy");
    assert!(!proxy.is_loaded());
    assert!(proxy.to_record().is_err());

    assert_eq!(proxy.decode::<Venue>().await?, Some(neumos));
    assert!(proxy.is_loaded());
    assert!(proxy.to_record().is_ok());

    let missing = manager.create_proxy("App\\Venue", "v404").await?;
    let missing = missing.as_any().downcast_ref::<EntityProxy>().expect("proxy");
    assert!(missing.load().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_select_request() -> Result<()> {
    let manager = manager()?;
    let venues = [
        venue("v1", "Neumos", "Seattle", 650),
        venue("v2", "Barboza", "Seattle", 200),
        venue("v3", "Crocodile", "Seattle", 750),
        venue("v4", "Doug Fir", "Portland", 299),
    ];
    manager
        .save(venues.iter().map(|v| v as &dyn Entity), false)
        .await?;

    let found = manager
        .create_select_request("App\\Venue")
        .await?
        .filter_eq("city", "Seattle")
        .order_by("capacity", SortOrder::Desc)
        .limit(2)
        .fetch()
        .await?
        .decode_all::<Venue>()?;

    let names: Vec<&str> = found.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["Crocodile", "Neumos"]);
    Ok(())
}

#[tokio::test]
async fn test_analyzer_cache_is_shared_per_identity() -> Result<()> {
    let cache = Arc::new(MemoryCacheBackend::new());
    let metadata = Arc::new(registry());
    let store = MemoryStore::new();

    let build = |identity: &str| {
        let engines = EngineRegistry::new()
            .with_engine("memory", Arc::new(MemoryEngine::new(store.clone())))
            .expect("memory engine");
        let settings = ManagerConfig {
            identity: identity.to_string(),
            ..ManagerConfig::default()
        };
        Manager::new(settings, cache.clone(), metadata.clone(), engines)
    };

    let first = build("Main");
    first.get_gateway("App\\Venue").await?;
    let inspected = metadata.inspection_count();

    let second = build("Main");
    second.get_gateway("App\\Venue").await?;
    assert_eq!(metadata.inspection_count(), inspected);

    let other = build("Reporting");
    other.get_gateway("App\\Venue").await?;
    assert!(metadata.inspection_count() > inspected);

    assert!(cache.keys().contains(&analyzer_cache_key("Main", "App\\Venue")));
    assert!(cache.keys().contains(&analyzer_cache_key("Reporting", "App\\Venue")));
    Ok(())
}

#[tokio::test]
async fn test_manager_metadata_can_be_inserted_directly() -> Result<()> {
    let registry = registry();
    registry.insert(EntityMetadata::new("App\\Artist", "memory").with_source("artists"));
    let store = MemoryStore::new();
    let manager = Manager::from_config(&Config::default(), registry, store.clone())?;

    let artist = Record::new("\\App\\Artist", Some(EntityId::from(1i64))).with_field("name", "Bill Frisell");
    manager.save_one(&artist, false).await?;

    let stored = manager.get_by_id("App\\Artist", 1i64).await?.expect("artist saved");
    assert_eq!(stored.to_record()?.get("name"), Some(&serde_json::json!("Bill Frisell")));
    assert_eq!(store.count("artists"), 1);
    Ok(())
}

/// Engine that publishes two links for the type it builds and resolves the
/// type after each one.
struct RelinkingEngine {
    store: MemoryStore,
    seen: Mutex<Vec<(GatewayState, Arc<dyn Gateway>)>>,
    published: Mutex<Vec<Arc<dyn Gateway>>>,
}

impl RelinkingEngine {
    fn new(store: MemoryStore) -> Self {
        Self {
            store,
            seen: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GatewayEngine for RelinkingEngine {
    fn name(&self) -> &str {
        "relinking"
    }

    async fn build(&self, manager: ManagerHandle, analyzer: EntityAnalyzer) -> orm_manager::Result<Arc<dyn Gateway>> {
        let owner = manager.upgrade()?;
        let entity_type = analyzer.entity_type().clone();
        let first: Arc<dyn Gateway> = Arc::new(MemoryGateway::new(
            manager.clone(),
            analyzer.clone(),
            self.store.clone(),
        ));
        let second: Arc<dyn Gateway> = Arc::new(MemoryGateway::new(manager, analyzer, self.store.clone()));

        // Published under the separator-prefixed spelling, resolved without it.
        owner.set_gateway_link(format!("\\{}", entity_type), &first);
        let resolved = owner.get_gateway(entity_type.as_str()).await?;
        self.seen.lock().push((owner.gateway_state(&entity_type), resolved));

        owner.set_gateway_link(entity_type.as_str(), &second);
        let resolved = owner.get_gateway(format!("\\{}", entity_type)).await?;
        self.seen.lock().push((owner.gateway_state(&entity_type), resolved));

        self.published.lock().extend([first, second.clone()]);
        Ok(second)
    }
}

/// Memory engine that parks inside `build` until released.
struct GatedEngine {
    inner: MemoryEngine,
    started: Notify,
    release: Notify,
}

#[async_trait]
impl GatewayEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    async fn build(&self, manager: ManagerHandle, analyzer: EntityAnalyzer) -> orm_manager::Result<Arc<dyn Gateway>> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.build(manager, analyzer).await
    }
}

#[tokio::test]
async fn test_manager_link_last_one_wins_and_is_normalized() -> Result<()> {
    let store = MemoryStore::new();
    let manager = manager_with(&store)?;
    let engine = Arc::new(RelinkingEngine::new(store.clone()));
    manager.add_engine("archive", engine.clone())?;

    let committed = manager.get_gateway("App\\Ticket").await?;

    let seen = engine.seen.lock();
    let published = engine.published.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, GatewayState::Reserved);
    assert!(Arc::ptr_eq(&seen[0].1, &published[0]));
    assert_eq!(seen[1].0, GatewayState::Reserved);
    assert!(Arc::ptr_eq(&seen[1].1, &published[1]));
    assert!(!Arc::ptr_eq(&seen[1].1, &published[0]));

    assert!(Arc::ptr_eq(&committed, &published[1]));
    assert_eq!(manager.gateway_state("App\\Ticket"), GatewayState::Ready);
    Ok(())
}

#[tokio::test]
async fn test_failed_build_does_not_leave_dead_relations() -> Result<()> {
    let store = MemoryStore::new();
    let registry = registry();
    registry
        .insert(
            EntityMetadata::new("App\\Tour", "memory")
                .with_relation("headliner", "App\\Band")
                .with_relation("poster", "App\\Poster"),
        )
        .insert(EntityMetadata::new("App\\Band", "memory").with_relation("tour", "App\\Tour"))
        .insert(EntityMetadata::new("App\\Poster", "print"));
    let manager = Manager::from_config(&Config::default(), registry, store.clone())?;

    // Band commits against Tour's link, then Poster has no engine and Tour is rolled back.
    assert!(matches!(
        manager.get_gateway("App\\Tour").await,
        Err(OrmError::GatewayNotFound { .. })
    ));
    assert_eq!(manager.gateway_state("App\\Tour"), GatewayState::Unresolved);
    let band = manager.get_gateway("App\\Band").await?;
    assert!(band.relation("tour").is_none());

    manager.add_engine("print", Arc::new(MemoryEngine::new(store.clone())))?;
    let tour = manager.get_gateway("App\\Tour").await?;

    let tour_of_band = band.relation("tour").expect("relation follows the rebuilt gateway");
    assert!(Arc::ptr_eq(&tour_of_band, &tour));
    let headliner = tour.relation("headliner").expect("headliner relation wired");
    assert!(Arc::ptr_eq(&headliner, &band));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_first_resolution_is_rejected() -> Result<()> {
    let store = MemoryStore::new();
    let manager = manager_with(&store)?;
    let engine = Arc::new(GatedEngine {
        inner: MemoryEngine::new(store.clone()),
        started: Notify::new(),
        release: Notify::new(),
    });
    manager.add_engine("archive", engine.clone())?;

    let building = tokio::spawn({
        let manager = manager.clone();
        async move { manager.get_gateway("App\\Ticket").await.map(|_| ()) }
    });
    engine.started.notified().await;

    let rival = manager.get_gateway("App\\Ticket").await;
    match rival {
        Err(err @ OrmError::ResolutionCycle(_)) => {
            assert!(err.to_string().contains("concurrent first resolution"));
        }
        other => panic!("expected ResolutionCycle, got {:?}", other.map(|g| g.entity_type().clone())),
    }

    engine.release.notify_one();
    building.await??;
    assert_eq!(manager.gateway_state("App\\Ticket"), GatewayState::Ready);
    Ok(())
}

/// Recorder counting increments per counter name on the current thread.
#[derive(Default)]
struct CountingRecorder {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

struct NamedCounter {
    name: String,
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl metrics::CounterFn for NamedCounter {
    fn increment(&self, value: u64) {
        *self.counts.lock().entry(self.name.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        self.counts.lock().insert(self.name.clone(), value);
    }
}

impl metrics::Recorder for CountingRecorder {
    fn describe_counter(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}
    fn describe_gauge(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}
    fn describe_histogram(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}

    fn register_counter(&self, key: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Counter {
        metrics::Counter::from_arc(Arc::new(NamedCounter {
            name: key.name().to_string(),
            counts: self.counts.clone(),
        }))
    }

    fn register_gauge(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
        metrics::Gauge::noop()
    }

    fn register_histogram(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Histogram {
        metrics::Histogram::noop()
    }
}

#[test]
fn test_failed_resolution_is_counted_once() -> Result<()> {
    let recorder = CountingRecorder::default();
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let manager = manager()?;
            // No engine is registered under Ticket's `archive` gateway.
            assert!(manager.get_gateway("App\\Ticket").await.is_err());
            anyhow::Ok(())
        })
    })?;

    let counts = recorder.counts.lock();
    assert_eq!(counts.get("orm_manager_gateway_resolution_failures_total"), Some(&1));
    Ok(())
}
