use migrate_config::shared::{PipelineConfig, RetryConfig};

use crate::checkpoint::CheckpointStore;
use crate::pipeline::Pipeline;
use crate::progress::MemoryRenderer;
use crate::sink::SinkConnector;
use crate::source::DocumentSource;
use crate::test_utils::schema::company_schema;

/// Pipeline sizing for tests: fast retries and a short progress poll.
pub fn test_pipeline_config(
    page_size: usize,
    item_size: usize,
    worker_count: usize,
) -> PipelineConfig {
    PipelineConfig {
        page_size,
        item_size,
        worker_count,
        queue_max_size: 4,
        progress_poll_ms: 20,
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: 0.0,
        },
        ..PipelineConfig::default()
    }
}

/// Builds a pipeline over the company schema that renders progress into `renderer`.
pub fn company_pipeline<Src, C, K>(
    config: PipelineConfig,
    source: Src,
    connector: C,
    checkpoint: K,
    renderer: MemoryRenderer,
) -> Pipeline<Src, C, K>
where
    Src: DocumentSource + Clone,
    C: SinkConnector,
    K: CheckpointStore + Clone,
{
    Pipeline::new(config, company_schema(), source, connector, checkpoint).with_renderer(renderer)
}
