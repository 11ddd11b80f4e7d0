//! Loading fairseq / PyTorch checkpoints into the burn modules.
//!
//! Parameter names follow fairseq except where burn modules use named fields
//! instead of `nn.Sequential` indices; those keys are remapped on load.
//! `PytorchStore` handles the linear weight transpose and the norm
//! `weight`/`bias` to `gamma`/`beta` renames.

use std::path::Path;

use burn::prelude::*;
use burn_store::{ModuleSnapshot, PytorchStore};
use tracing::info;

use super::projector::EmbeddingProjector;
use super::wav2vec2::Wav2Vec2;
use crate::error::{NomadError, Result};

/// fairseq stores the model state under this key next to its training args.
const FAIRSEQ_STATE_KEY: &str = "model";

/// `nn.Sequential(conv, dropout, norm, gelu)` indices to named fields, plus
/// both weight-norm parameter spellings.
const EXTRACTOR_KEY_REMAPS: &[(&str, &str)] = &[
    (r"(conv_layers\.\d+)\.0\.", "${1}.conv."),
    (r"(conv_layers\.\d+)\.2\.", "${1}.norm."),
    (r"pos_conv\.0\.", "pos_conv."),
    (r"parametrizations\.weight\.original0", "weight_g"),
    (r"parametrizations\.weight\.original1", "weight_v"),
];

/// NOMAD state dict prefixes to the projector's fields.
const PROJECTOR_KEY_REMAPS: &[(&str, &str)] = &[
    (r"^ssl_model\.", "extractor."),
    (r"^embedding_layer\.1\.", "head.linear."),
];

/// Load pretrained wav2vec 2.0 weights from a fairseq checkpoint.
pub fn load_extractor<B: Backend>(model: &mut Wav2Vec2<B>, path: &Path) -> Result<()> {
    ensure_exists(path)?;
    let mut store = with_remaps(PytorchStore::from_file(path), EXTRACTOR_KEY_REMAPS)
        .with_top_level_key(FAIRSEQ_STATE_KEY)
        .allow_partial(false);
    guarded_load(path, || model.load_from(&mut store))?;
    info!("Loaded wav2vec 2.0 weights from {}", path.display());
    Ok(())
}

/// Load the NOMAD state dict (extractor plus projection head).
pub fn load_projector<B: Backend>(model: &mut EmbeddingProjector<B>, path: &Path) -> Result<()> {
    ensure_exists(path)?;
    let store = with_remaps(PytorchStore::from_file(path), PROJECTOR_KEY_REMAPS);
    let mut store = with_remaps(store, EXTRACTOR_KEY_REMAPS).allow_partial(false);
    guarded_load(path, || model.load_from(&mut store))?;
    info!("Loaded NOMAD projector weights from {}", path.display());
    Ok(())
}

fn with_remaps(mut store: PytorchStore, remaps: &[(&str, &str)]) -> PytorchStore {
    for &(pattern, replacement) in remaps {
        store = store.with_key_remapping(pattern, replacement);
    }
    store
}

/// Run a load, turning both errors and reader panics into `ModelLoad`.
fn guarded_load<T, E: std::fmt::Display>(
    path: &Path,
    load: impl FnOnce() -> std::result::Result<T, E>,
) -> Result<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(load)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(model_load_error(path, err)),
        Err(_) => Err(model_load_error(path, "checkpoint reader panicked")),
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(NomadError::ModelLoad {
        path: path.to_path_buf(),
        detail: "checkpoint not found".into(),
    })
}

fn model_load_error(path: &Path, err: impl std::fmt::Display) -> NomadError {
    NomadError::ModelLoad {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::projector::tests::tiny_config;

    type B = burn::backend::NdArray;

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn values<const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-6, "{actual} != {expected}");
    }

    #[test]
    fn fairseq_checkpoint_loads_under_model_key() {
        let device = Default::default();
        let mut model = tiny_config().init::<B>(&device);
        load_extractor(&mut model.extractor, &fixture("tiny_wav2vec.pt")).unwrap();

        // torch Linear weight is [out, in]; burn stores [in, out].
        let proj = values(model.extractor.post_extract_proj.weight.val());
        assert_close(proj[16 + 2], 0.001 * (2 * 8 + 1) as f32);
        let weight_g = values(model.extractor.encoder.pos_conv.weight_g.val());
        assert_close(weight_g[0], 0.45);
    }

    #[test]
    fn nomad_state_dict_maps_ssl_model_and_head() {
        let device = Default::default();
        let mut model = tiny_config().init::<B>(&device);
        load_projector(&mut model, &fixture("tiny_nomad.pt")).unwrap();

        let head = values(model.head.linear.weight.val());
        assert_eq!(head.len(), 16 * 6);
        // torch [3][2] lands at burn [2][3].
        assert_close(head[2 * 6 + 3], 0.01 * (3 * 16 + 2) as f32);
        let bias = values(model.head.linear.bias.as_ref().unwrap().val());
        assert_close(bias[5], 0.5);
        let proj = values(model.extractor.post_extract_proj.weight.val());
        assert_close(proj[16 + 2], 0.001 * (2 * 8 + 1) as f32);
    }

    #[test]
    fn parametrized_weight_norm_keys_load() {
        let device = Default::default();
        let mut model = tiny_config().init::<B>(&device);
        load_projector(&mut model, &fixture("tiny_nomad_parametrized.pt")).unwrap();

        let weight_g = values(model.extractor.encoder.pos_conv.weight_g.val());
        assert_close(weight_g[0], 0.45);
        let head = values(model.head.linear.weight.val());
        assert_close(head[2 * 6 + 3], 0.5);
    }

    #[test]
    fn loaded_projector_produces_unit_embeddings() {
        use crate::embedding::Embedder;
        use crate::model::LoadedProjector;

        let device = Default::default();
        let mut model = tiny_config().init::<B>(&device);
        load_projector(&mut model, &fixture("tiny_nomad.pt")).unwrap();
        let projector = LoadedProjector::cpu(model);
        let wave: Vec<f32> = (0..800)
            .map(|i| (i as f32 * 0.07).sin() * 0.5)
            .collect();
        let embedding = projector.embed_one(&wave).unwrap();
        assert_eq!(embedding.dim(), 6);
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn missing_checkpoint_is_a_model_load_error() {
        let device = Default::default();
        let mut model = tiny_config().init::<B>(&device);
        let dir = tempfile::tempdir().unwrap();
        let err = load_projector(&mut model, &dir.path().join("nomad_best_model.pt")).unwrap_err();
        assert!(matches!(err, NomadError::ModelLoad { .. }));
    }

    #[test]
    fn corrupt_checkpoint_is_a_model_load_error() {
        let device = Default::default();
        let mut model = tiny_config().init::<B>(&device);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wav2vec_small.pt");
        std::fs::write(&path, b"not a torch checkpoint").unwrap();
        let err = load_extractor(&mut model.extractor, &path).unwrap_err();
        match err {
            NomadError::ModelLoad { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
