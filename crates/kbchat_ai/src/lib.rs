pub mod chunking;
pub mod client;
pub mod embeddings;
pub mod index;
pub mod knowledge_base;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod retrieve;
pub mod search;

#[cfg(test)]
mod tests {
    use super::client::ServiceClient;
    use super::embeddings::{DisabledEmbedder, Embedder};
    use super::llm::{DisabledLlm, Llm};
    use kbchat_core::error::{codes, AppError};
    use std::time::Duration;

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let c = ServiceClient::new(
            "https://generativelanguage.googleapis.com/",
            "k",
            Duration::from_secs(5),
        )
        .expect("client");
        assert_eq!(c.base_url(), "https://generativelanguage.googleapis.com");
        assert_eq!(c.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn disabled_services_surface_their_configuration_error() {
        let reason = AppError::new(codes::CONFIG_MISSING_CREDENTIAL, "no key");
        let e = DisabledEmbedder::new(reason.clone())
            .embed("m", "x")
            .expect_err("disabled");
        assert_eq!(e, reason);
        let e = DisabledLlm::new(reason.clone())
            .generate("m", "x")
            .expect_err("disabled");
        assert_eq!(e.code, codes::CONFIG_MISSING_CREDENTIAL);
    }
}
