pub mod quiz_pipeline;

pub use quiz_pipeline::{
    form_title, DeliveryReport, GeneratedQuiz, QuizDelivery, QuizPipeline, QuizRequest,
};
