//! Threaded engine tests.
//!
//! These run the real backend thread and worker pool against a frontend
//! pumped from the test thread.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use crate::{
        ActiveTileSet, BuildOutput, DrapeConfig, DrapeEngine, FrontendConfig, GpuSubmitter,
        MasterPointer, ReadManagerConfig, ReadManagerConfigError, ReadManagerError, RenderState,
        ScreenBase, TileBuildError, TileBuildRequest, TileBuilder, TileKey, Viewport, WorldRect,
    };
    use render_protocol::{DepthLayer, ProgramId};
    use tiles::TileReadState;

    struct TestBucket {
        generation: u64,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for TestBucket {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TestBuilder {
        buckets_per_tile: usize,
        created: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    impl TileBuilder<TestBucket> for TestBuilder {
        fn build(
            &self,
            request: &TileBuildRequest,
            output: &mut BuildOutput<'_, TestBucket>,
        ) -> Result<(), TileBuildError> {
            for _ in 0..self.buckets_per_tile {
                self.created.fetch_add(1, Ordering::SeqCst);
                output.flush(
                    RenderState::new(ProgramId(3), DepthLayer::Geometry),
                    TestBucket {
                        generation: request.generation().0,
                        drops: Arc::clone(&self.drops),
                    },
                )?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSubmitter {
        bound: usize,
        released: usize,
        idle: Vec<TileKey>,
        resizes: usize,
    }

    impl GpuSubmitter<TestBucket> for CountingSubmitter {
        fn bind_bucket(&mut self, _key: TileKey, _state: &RenderState, _bucket: &mut TestBucket) {
            self.bound += 1;
        }

        fn release_bucket(
            &mut self,
            _key: TileKey,
            _state: &RenderState,
            _bucket: MasterPointer<TestBucket>,
        ) {
            self.released += 1;
        }

        fn update_visibility(&mut self, _screen: &ScreenBase, _tiles: &ActiveTileSet) {}

        fn tile_idle(&mut self, key: TileKey) {
            self.idle.push(key);
        }

        fn resize(&mut self, _viewport: Viewport) {
            self.resizes += 1;
        }
    }

    struct Fixture {
        engine: DrapeEngine<CountingSubmitter, TestBucket>,
        created: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    fn fixture(buckets_per_tile: usize) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let created = Arc::new(AtomicUsize::new(0));
        let drops = Arc::new(AtomicUsize::new(0));
        let config = DrapeConfig {
            read_manager: ReadManagerConfig {
                worker_count: 3,
                ..ReadManagerConfig::default()
            },
            frontend: FrontendConfig {
                wait_timeout: Duration::from_millis(5),
                ..FrontendConfig::default()
            },
            ..DrapeConfig::default()
        };
        let engine = DrapeEngine::new(
            config,
            Arc::new(TestBuilder {
                buckets_per_tile,
                created: Arc::clone(&created),
                drops: Arc::clone(&drops),
            }),
            CountingSubmitter::default(),
        )
        .expect("start engine");
        Fixture {
            engine,
            created,
            drops,
        }
    }

    fn viewport() -> Viewport {
        Viewport::new(0, 0, 800, 600)
    }

    /// Every active tile finished its latest build and nothing else is held.
    fn settled(engine: &DrapeEngine<CountingSubmitter, TestBucket>) -> bool {
        let frontend = engine.frontend();
        let active = frontend.active_tiles();
        !active.is_empty()
            && active
                .iter()
                .all(|key| frontend.lifecycle().state(key) == Some(TileReadState::Idle))
            && frontend
                .store()
                .retained_keys()
                .all(|key| active.contains(&key))
    }

    fn pump_until(
        engine: &mut DrapeEngine<CountingSubmitter, TestBucket>,
        done: impl Fn(&DrapeEngine<CountingSubmitter, TestBucket>) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done(engine) {
            assert!(Instant::now() < deadline, "engine did not settle in time");
            engine.process_pending().expect("process pending");
        }
    }

    #[test]
    fn resize_builds_and_binds_the_whole_world() {
        let mut fixture = fixture(2);
        fixture.engine.resize(viewport()).expect("resize");
        pump_until(&mut fixture.engine, settled);

        let frontend = fixture.engine.frontend();
        assert_eq!(frontend.active_tiles().len(), 4);
        assert_eq!(frontend.store().bucket_count(), 8);
        assert_eq!(fixture.engine.submitter().bound, 8);
        assert_eq!(fixture.engine.submitter().resizes, 1);
        let idle: BTreeSet<TileKey> = fixture.engine.submitter().idle.iter().copied().collect();
        assert_eq!(&idle, frontend.active_tiles().as_set());
    }

    #[test]
    fn zooming_in_replaces_every_tile() {
        let mut fixture = fixture(1);
        fixture.engine.resize(viewport()).expect("resize");
        pump_until(&mut fixture.engine, settled);

        let zoomed = ScreenBase::whole_world(viewport())
            .and_then(|screen| screen.zoom_about_pixel(2.0, 400.0, 300.0))
            .expect("zoomed screen");
        fixture.engine.update_model_view(zoomed).expect("zoom");
        pump_until(&mut fixture.engine, |engine| {
            settled(engine)
                && engine
                    .frontend()
                    .active_tiles()
                    .iter()
                    .all(|key| key.zoom() == 2)
        });

        let frontend = fixture.engine.frontend();
        assert!(frontend.store().retained_keys().all(|key| key.zoom() == 2));
        assert_eq!(fixture.engine.submitter().released, 4);
        assert_eq!(
            fixture.drops.load(Ordering::SeqCst),
            fixture.engine.submitter().released
        );
    }

    #[test]
    fn invalidation_rebuilds_and_retires_the_old_bucket() {
        let mut fixture = fixture(1);
        fixture.engine.resize(viewport()).expect("resize");
        pump_until(&mut fixture.engine, settled);
        let key = TileKey::new(0, 0, 1);
        let before = fixture
            .engine
            .frontend()
            .lifecycle()
            .current_generation(&key)
            .expect("tracked tile");

        fixture
            .engine
            .invalidate_rect(WorldRect::new(0.1, 0.1, 0.2, 0.2))
            .expect("invalidate");
        pump_until(&mut fixture.engine, |engine| {
            settled(engine)
                && engine
                    .frontend()
                    .lifecycle()
                    .current_generation(&key)
                    .is_some_and(|generation| generation > before)
        });

        let frontend = fixture.engine.frontend();
        let generations: Vec<u64> = frontend
            .store()
            .buckets_for(&key)
            .map(|bound| bound.bucket.generation)
            .collect();
        assert_eq!(generations.len(), 1);
        assert!(generations[0] > before.0);
        assert_eq!(fixture.engine.submitter().released, 1);
    }

    #[test]
    fn dropping_the_engine_mid_flight_releases_every_bucket_once() {
        let fixture = fixture(4);
        let Fixture {
            mut engine,
            created,
            drops,
        } = fixture;
        engine.resize(viewport()).expect("resize");
        engine.process_pending().expect("process pending");

        drop(engine);

        assert_eq!(drops.load(Ordering::SeqCst), created.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_worker_count_fails_engine_construction() {
        let config = DrapeConfig {
            read_manager: ReadManagerConfig {
                worker_count: 0,
                ..ReadManagerConfig::default()
            },
            ..DrapeConfig::default()
        };
        let created = Arc::new(AtomicUsize::new(0));
        let result: Result<DrapeEngine<CountingSubmitter, TestBucket>, ReadManagerError> =
            DrapeEngine::new(
                config,
                Arc::new(TestBuilder {
                    buckets_per_tile: 1,
                    created: Arc::clone(&created),
                    drops: Arc::new(AtomicUsize::new(0)),
                }),
                CountingSubmitter::default(),
            );
        assert!(matches!(
            result,
            Err(ReadManagerError::Config(ReadManagerConfigError::WorkerCountZero))
        ));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backend_keeps_running_until_drop() {
        let fixture = fixture(1);
        assert!(fixture.engine.is_backend_running());
        let created = Arc::clone(&fixture.created);
        drop(fixture);
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }
}
