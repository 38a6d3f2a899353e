use docrag_core::config::EmbeddingConfig;
use docrag_core::types::EmbedRole;
use docrag_embed::{get_default_embedder, FakeEmbedder};
use docrag_core::traits::Embedder;

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let config = EmbeddingConfig { use_fake: true, dim: 256, ..EmbeddingConfig::default() };
    let embedder = get_default_embedder(&config).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts, EmbedRole::Passage).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 256, "embedding dim follows config");
    assert_eq!(embedder.dim(), 256);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_prefers_shared_words() {
    let e = FakeEmbedder::new(512);
    let q = e.embed_batch(&["annual leave days".to_string()], EmbedRole::Query).unwrap().remove(0);
    let docs = e
        .embed_batch(&["Annual leave is twenty days.".to_string(), "Parking permits renew in May.".to_string()], EmbedRole::Passage)
        .unwrap();
    assert!(dot(&q, &docs[0]) > dot(&q, &docs[1]));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let e = FakeEmbedder::new(8);
    let v = e.embed_batch(&["  ".to_string()], EmbedRole::Passage).unwrap().remove(0);
    assert!(v.iter().all(|x| *x == 0.0));
}
