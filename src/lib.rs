//! AI dress designer backend: a questionnaire wizard plus relays that turn
//! answers into a refined prompt and a rendered design image.

pub mod config;
pub mod designs;
pub mod messages;
pub mod models;
pub mod openrouter;
pub mod pipeline;
pub mod prompts;
pub mod relay;
pub mod routes;
pub mod wizard;
