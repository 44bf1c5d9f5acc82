//! Built-in model table.
//!
//! Prices are list prices in micro-dollars. Parameter schemas start from the
//! category defaults below and are adjusted per model where the upstream
//! endpoint differs.

use crate::cost::{CostFormula, Money};
use crate::provider::ProviderId;
use crate::registry::category::ModelCategory::{self, *};
use crate::registry::schema::{ParamKind, ParamSpec};
use crate::registry::ModelDescriptor;

const VIDEO_RESOLUTIONS: &[&str] = &["480p", "720p", "1080p"];
const ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];

const SEEDANCE_PRO: &[(&str, Money)] = &[
    ("480p", Money::from_micros(30_000)),
    ("720p", Money::from_micros(60_000)),
    ("1080p", Money::from_micros(124_000)),
];
const SEEDANCE_LITE: &[(&str, Money)] = &[
    ("480p", Money::from_micros(18_000)),
    ("720p", Money::from_micros(36_000)),
    ("1080p", Money::from_micros(72_000)),
];
const WAN_T2V: &[(&str, Money)] = &[
    ("480p", Money::from_micros(200_000)),
    ("720p", Money::from_micros(400_000)),
];
const WAN_25: &[(&str, Money)] = &[
    ("480p", Money::from_micros(50_000)),
    ("720p", Money::from_micros(100_000)),
    ("1080p", Money::from_micros(150_000)),
];
const PIXVERSE: &[(&str, Money)] = &[
    ("540p", Money::from_micros(30_000)),
    ("720p", Money::from_micros(40_000)),
    ("1080p", Money::from_micros(80_000)),
];
const INFINITALK: &[(&str, Money)] = &[
    ("480p", Money::from_micros(20_000)),
    ("720p", Money::from_micros(40_000)),
];
const FABRIC: &[(&str, Money)] = &[
    ("480p", Money::from_micros(80_000)),
    ("720p", Money::from_micros(150_000)),
];
const BYTEDANCE_UPSCALE: &[(&str, Money)] = &[
    ("1080p", Money::from_micros(30_000)),
    ("2k", Money::from_micros(60_000)),
    ("4k", Money::from_micros(90_000)),
];

/// Default input schema for a category.
pub fn default_params(category: ModelCategory) -> Vec<ParamSpec> {
    use ParamKind::*;
    let req = ParamSpec::required;
    let opt = ParamSpec::optional;
    match category {
        TextToImage => vec![
            req("prompt", Text),
            opt("negative_prompt", Text),
            opt("image_size", Text),
            opt("num_images", Integer),
            opt("seed", Integer),
        ],
        ImageToImage => vec![
            req("prompt", Text),
            req("image", Image),
            opt("strength", Number),
            opt("num_images", Integer),
            opt("seed", Integer),
        ],
        TextToVideo => vec![
            req("prompt", Text),
            opt("negative_prompt", Text),
            opt("duration", Number),
            opt("aspect_ratio", Choice(ASPECT_RATIOS)),
            opt("resolution", Choice(VIDEO_RESOLUTIONS)),
            opt("seed", Integer),
        ],
        ImageToVideo => vec![
            req("image", Image),
            req("prompt", Text),
            opt("end_image", Image),
            opt("negative_prompt", Text),
            opt("duration", Number),
            opt("resolution", Choice(VIDEO_RESOLUTIONS)),
            opt("seed", Integer),
        ],
        VideoToVideo => vec![
            req("video", Video),
            opt("prompt", Text),
            opt("image", Image),
            opt("duration", Number),
        ],
        Avatar => vec![
            req("image", Image),
            req("audio", Audio),
            opt("prompt", Text),
            opt("duration", Number),
        ],
        MotionTransfer => vec![
            req("image", Image),
            req("video", Video),
            opt("prompt", Text),
            opt("duration", Number),
        ],
        Upscale => vec![req("image", Image), opt("scale", Integer)],
        UpscaleVideo => vec![
            req("video", Video),
            opt("scale", Integer),
            opt("duration", Number),
        ],
        AddAudio => vec![
            req("video", Video),
            opt("prompt", Text),
            opt("negative_prompt", Text),
            opt("duration", Number),
        ],
        TextToSpeech => vec![
            req("text", Text),
            opt("voice", Text),
            opt("stability", Number),
            opt("speed", Number),
        ],
        SpeechToText => vec![
            req("audio", Audio),
            opt("language", Text),
            opt("duration", Number),
        ],
        ImageUnderstanding => vec![req("image", Image), opt("prompt", Text)],
        PromptGeneration => vec![
            req("prompt", Text),
            opt("system", Text),
            opt("image", Image),
            opt("max_tokens", Integer),
        ],
    }
}

const fn usd(micros: i64) -> Money {
    Money::from_micros(micros)
}

fn flat(micros: i64) -> CostFormula {
    CostFormula::Flat(usd(micros))
}

fn per_image(micros: i64) -> CostFormula {
    CostFormula::PerItem {
        unit: usd(micros),
        param: "num_images",
        default: 1,
    }
}

fn per_second(micros: i64, default_seconds: f64) -> CostFormula {
    CostFormula::PerSecond {
        rate: usd(micros),
        param: "duration",
        default: Some(default_seconds),
    }
}

fn per_kchars(micros: i64) -> CostFormula {
    CostFormula::PerThousandChars {
        rate: usd(micros),
        param: "text",
    }
}

fn tiered_per_second(
    tiers: &'static [(&'static str, Money)],
    default_tier: &'static str,
    default_seconds: f64,
) -> CostFormula {
    CostFormula::TieredPerSecond {
        tier_param: "resolution",
        tiers,
        default_tier,
        seconds_param: "duration",
        default_seconds: Some(default_seconds),
    }
}

fn fal(
    key: &'static str,
    name: &'static str,
    category: ModelCategory,
    endpoint: &'static str,
    cost: CostFormula,
) -> ModelDescriptor {
    ModelDescriptor::new(key, name, category, ProviderId::Fal, endpoint, cost)
}

fn replicate(
    key: &'static str,
    name: &'static str,
    category: ModelCategory,
    endpoint: &'static str,
    cost: CostFormula,
) -> ModelDescriptor {
    ModelDescriptor::new(key, name, category, ProviderId::Replicate, endpoint, cost)
}

fn openrouter(key: &'static str, name: &'static str, remote: &'static str, micros: i64) -> ModelDescriptor {
    ModelDescriptor::new(
        key,
        name,
        PromptGeneration,
        ProviderId::OpenRouter,
        "chat/completions",
        flat(micros),
    )
    .with_remote_model(remote)
}

pub fn builtin_models() -> Vec<ModelDescriptor> {
    let mut models = Vec::with_capacity(96);
    models.extend(text_to_image());
    models.extend(image_to_image());
    models.extend(text_to_video());
    models.extend(image_to_video());
    models.extend(video_to_video());
    models.extend(avatar());
    models.extend(motion_transfer());
    models.extend(upscale());
    models.extend(upscale_video());
    models.extend(add_audio());
    models.extend(text_to_speech());
    models.extend(speech_to_text());
    models.extend(image_understanding());
    models.extend(prompt_generation());
    models
}

fn text_to_image() -> Vec<ModelDescriptor> {
    vec![
        fal("flux_dev", "FLUX.1 [dev]", TextToImage, "fal-ai/flux/dev", per_image(25_000)),
        fal("flux_schnell", "FLUX.1 [schnell]", TextToImage, "fal-ai/flux/schnell", per_image(3_000)),
        fal("flux_pro", "FLUX1.1 [pro]", TextToImage, "fal-ai/flux-pro/v1.1", per_image(40_000)),
        fal(
            "flux_pro_ultra",
            "FLUX1.1 [pro] ultra",
            TextToImage,
            "fal-ai/flux-pro/v1.1-ultra",
            per_image(60_000),
        ),
        fal("imagen4", "Imagen 4", TextToImage, "fal-ai/imagen4/preview", per_image(40_000)),
        fal(
            "seedream_v3",
            "Seedream 3.0",
            TextToImage,
            "fal-ai/bytedance/seedream/v3/text-to-image",
            per_image(30_000),
        ),
        fal("nano_banana", "Nano Banana", TextToImage, "fal-ai/nano-banana", per_image(39_000)),
        fal("recraft_v3", "Recraft V3", TextToImage, "fal-ai/recraft-v3", per_image(40_000))
            .with_param(ParamSpec::optional(
                "style",
                ParamKind::Choice(&["realistic_image", "digital_illustration", "vector_illustration"]),
            )),
        fal("ideogram_v3", "Ideogram 3.0", TextToImage, "fal-ai/ideogram/v3", per_image(60_000)),
        fal("hidream_i1", "HiDream-I1 Full", TextToImage, "fal-ai/hidream-i1-full", per_image(50_000)),
        replicate(
            "sdxl",
            "Stable Diffusion XL",
            TextToImage,
            "models/stability-ai/sdxl/predictions",
            per_image(4_000),
        ),
    ]
}

fn image_to_image() -> Vec<ModelDescriptor> {
    vec![
        fal("flux_kontext", "FLUX.1 Kontext [pro]", ImageToImage, "fal-ai/flux-pro/kontext", per_image(40_000)),
        fal(
            "flux_kontext_max",
            "FLUX.1 Kontext [max]",
            ImageToImage,
            "fal-ai/flux-pro/kontext/max",
            per_image(80_000),
        ),
        fal("nano_banana_edit", "Nano Banana Edit", ImageToImage, "fal-ai/nano-banana/edit", per_image(39_000)),
        fal(
            "seededit_v3",
            "SeedEdit 3.0",
            ImageToImage,
            "fal-ai/bytedance/seededit/v3/edit-image",
            flat(30_000),
        ),
        fal("qwen_image_edit", "Qwen Image Edit", ImageToImage, "fal-ai/qwen-image-edit", per_image(30_000)),
        fal("flux_redux", "FLUX.1 Redux [dev]", ImageToImage, "fal-ai/flux/dev/redux", per_image(25_000))
            .with_param(ParamSpec::optional("prompt", ParamKind::Text)),
        fal("photon_modify", "Luma Photon Modify", ImageToImage, "fal-ai/luma-photon/modify", flat(19_000)),
    ]
}

fn text_to_video() -> Vec<ModelDescriptor> {
    vec![
        fal(
            "kling_v2_1_master_t2v",
            "Kling 2.1 Master",
            TextToVideo,
            "fal-ai/kling-video/v2.1/master/text-to-video",
            per_second(280_000, 5.0),
        ),
        fal("veo3", "Veo 3", TextToVideo, "fal-ai/veo3", per_second(750_000, 8.0)),
        fal("veo3_fast", "Veo 3 Fast", TextToVideo, "fal-ai/veo3/fast", per_second(400_000, 8.0)),
        fal(
            "hailuo_02_t2v",
            "MiniMax Hailuo 02",
            TextToVideo,
            "fal-ai/minimax/hailuo-02/standard/text-to-video",
            per_second(45_000, 6.0),
        ),
        fal(
            "seedance_v1_pro_t2v",
            "Seedance 1.0 Pro",
            TextToVideo,
            "fal-ai/bytedance/seedance/v1/pro/text-to-video",
            tiered_per_second(SEEDANCE_PRO, "1080p", 5.0),
        ),
        fal(
            "wan_2_2_t2v",
            "Wan 2.2",
            TextToVideo,
            "fal-ai/wan/v2.2-a14b/text-to-video",
            CostFormula::Tiered {
                param: "resolution",
                tiers: WAN_T2V,
                default: "720p",
            },
        )
        .with_param(ParamSpec::optional("resolution", ParamKind::Choice(&["480p", "720p"]))),
        fal(
            "ltx_video_t2v",
            "LTX Video 13B",
            TextToVideo,
            "fal-ai/ltx-video-13b-distilled",
            flat(40_000),
        ),
        fal("sora_2_t2v", "Sora 2", TextToVideo, "fal-ai/sora-2/text-to-video", per_second(100_000, 4.0)),
        fal(
            "pixverse_v5_t2v",
            "PixVerse v5",
            TextToVideo,
            "fal-ai/pixverse/v5/text-to-video",
            tiered_per_second(PIXVERSE, "720p", 5.0),
        )
        .with_param(ParamSpec::optional(
            "resolution",
            ParamKind::Choice(&["540p", "720p", "1080p"]),
        )),
    ]
}

fn image_to_video() -> Vec<ModelDescriptor> {
    vec![
        fal(
            "kling_v2_1_standard_i2v",
            "Kling 2.1 Standard",
            ImageToVideo,
            "fal-ai/kling-video/v2.1/standard/image-to-video",
            per_second(50_000, 5.0),
        ),
        fal(
            "kling_v2_1_pro_i2v",
            "Kling 2.1 Pro",
            ImageToVideo,
            "fal-ai/kling-video/v2.1/pro/image-to-video",
            per_second(90_000, 5.0),
        ),
        fal(
            "kling_v2_5_turbo_i2v",
            "Kling 2.5 Turbo Pro",
            ImageToVideo,
            "fal-ai/kling-video/v2.5-turbo/pro/image-to-video",
            per_second(70_000, 5.0),
        ),
        fal(
            "hailuo_02_i2v",
            "MiniMax Hailuo 02",
            ImageToVideo,
            "fal-ai/minimax/hailuo-02/standard/image-to-video",
            per_second(45_000, 6.0),
        ),
        fal(
            "seedance_v1_pro_i2v",
            "Seedance 1.0 Pro",
            ImageToVideo,
            "fal-ai/bytedance/seedance/v1/pro/image-to-video",
            tiered_per_second(SEEDANCE_PRO, "1080p", 5.0),
        ),
        fal(
            "seedance_v1_lite_i2v",
            "Seedance 1.0 Lite",
            ImageToVideo,
            "fal-ai/bytedance/seedance/v1/lite/image-to-video",
            tiered_per_second(SEEDANCE_LITE, "720p", 5.0),
        ),
        fal(
            "veo3_i2v",
            "Veo 3",
            ImageToVideo,
            "fal-ai/veo3/image-to-video",
            per_second(750_000, 8.0),
        ),
        fal(
            "wan_2_5_i2v",
            "Wan 2.5",
            ImageToVideo,
            "fal-ai/wan-25-preview/image-to-video",
            tiered_per_second(WAN_25, "1080p", 5.0),
        ),
        fal(
            "vidu_q1_i2v",
            "Vidu Q1",
            ImageToVideo,
            "fal-ai/vidu/q1/image-to-video",
            per_second(80_000, 5.0),
        ),
        fal(
            "sora_2_i2v",
            "Sora 2",
            ImageToVideo,
            "fal-ai/sora-2/image-to-video",
            per_second(100_000, 4.0),
        ),
        fal(
            "ltx_2_i2v",
            "LTX-2 Fast",
            ImageToVideo,
            "fal-ai/ltxv-2/image-to-video/fast",
            per_second(40_000, 6.0),
        ),
    ]
}

fn video_to_video() -> Vec<ModelDescriptor> {
    vec![
        fal(
            "luma_ray2_modify",
            "Luma Ray 2 Modify",
            VideoToVideo,
            "fal-ai/luma-dream-machine/ray-2/modify",
            per_second(200_000, 5.0),
        ),
        fal("wan_vace", "Wan VACE 14B", VideoToVideo, "fal-ai/wan-vace-14b", per_second(80_000, 5.0)),
        replicate(
            "runway_aleph",
            "Runway Gen-4 Aleph",
            VideoToVideo,
            "models/runwayml/gen4-aleph/predictions",
            per_second(180_000, 5.0),
        ),
        fal(
            "video_background_removal",
            "BEN v2 Video",
            VideoToVideo,
            "fal-ai/ben/v2/video",
            per_second(10_000, 10.0),
        ),
    ]
}

fn avatar() -> Vec<ModelDescriptor> {
    vec![
        fal("omnihuman", "OmniHuman", Avatar, "fal-ai/bytedance/omnihuman", per_second(140_000, 10.0)),
        fal(
            "kling_avatar",
            "Kling AI Avatar Pro",
            Avatar,
            "fal-ai/kling-video/v1/pro/ai-avatar",
            per_second(115_000, 10.0),
        ),
        fal(
            "infinitalk",
            "InfiniTalk",
            Avatar,
            "fal-ai/infinitalk",
            tiered_per_second(INFINITALK, "480p", 10.0),
        )
        .with_param(ParamSpec::optional("resolution", ParamKind::Choice(&["480p", "720p"]))),
        fal("fabric_1", "VEED Fabric 1.0", Avatar, "veed/fabric-1.0", tiered_per_second(FABRIC, "480p", 10.0))
            .with_param(ParamSpec::optional("resolution", ParamKind::Choice(&["480p", "720p"]))),
        fal("multitalk", "MultiTalk", Avatar, "fal-ai/ai-avatar", flat(200_000)),
        fal(
            "sync_lipsync_v2",
            "Sync Lipsync 2.0",
            Avatar,
            "fal-ai/sync-lipsync/v2",
            per_second(50_000, 10.0),
        )
        .with_params(vec![
            ParamSpec::required("video", ParamKind::Video),
            ParamSpec::required("audio", ParamKind::Audio),
            ParamSpec::optional("sync_mode", ParamKind::Choice(&["cut_off", "loop", "bounce"])),
            ParamSpec::optional("duration", ParamKind::Number),
        ]),
    ]
}

fn motion_transfer() -> Vec<ModelDescriptor> {
    vec![
        fal(
            "wan_animate_move",
            "Wan 2.2 Animate Move",
            MotionTransfer,
            "fal-ai/wan/v2.2-14b/animate/move",
            per_second(80_000, 5.0),
        ),
        fal(
            "wan_animate_replace",
            "Wan 2.2 Animate Replace",
            MotionTransfer,
            "fal-ai/wan/v2.2-14b/animate/replace",
            per_second(80_000, 5.0),
        ),
        replicate(
            "runway_act_two",
            "Runway Act-Two",
            MotionTransfer,
            "models/runwayml/act-two/predictions",
            per_second(50_000, 5.0),
        ),
    ]
}

fn upscale() -> Vec<ModelDescriptor> {
    vec![
        fal("topaz_image_upscale", "Topaz Image Upscale", Upscale, "fal-ai/topaz/upscale/image", flat(80_000)),
        fal("clarity_upscaler", "Clarity Upscaler", Upscale, "fal-ai/clarity-upscaler", flat(30_000))
            .with_param(ParamSpec::optional("prompt", ParamKind::Text))
            .with_param(ParamSpec::optional("creativity", ParamKind::Number)),
        fal("seedvr_image_upscale", "SeedVR2 Image", Upscale, "fal-ai/seedvr/upscale/image", flat(10_000)),
        fal("esrgan", "ESRGAN", Upscale, "fal-ai/esrgan", flat(2_000)),
        fal("recraft_crisp_upscale", "Recraft Crisp Upscale", Upscale, "fal-ai/recraft/upscale/crisp", flat(4_000)),
        fal("ideogram_upscale", "Ideogram Upscale", Upscale, "fal-ai/ideogram/upscale", flat(60_000)),
        replicate(
            "real_esrgan",
            "Real-ESRGAN",
            Upscale,
            "models/nightmareai/real-esrgan/predictions",
            flat(2_500),
        ),
    ]
}

fn upscale_video() -> Vec<ModelDescriptor> {
    vec![
        fal(
            "topaz_video_upscale",
            "Topaz Video Upscale",
            UpscaleVideo,
            "fal-ai/topaz/upscale/video",
            CostFormula::PerSecond {
                rate: usd(80_000),
                param: "duration",
                default: None,
            },
        )
        .with_param(ParamSpec::required("duration", ParamKind::Number)),
        fal(
            "seedvr_video_upscale",
            "SeedVR2 Video",
            UpscaleVideo,
            "fal-ai/seedvr/upscale/video",
            per_second(15_000, 10.0),
        ),
        fal(
            "bytedance_video_upscale",
            "ByteDance Video Upscaler",
            UpscaleVideo,
            "fal-ai/bytedance-upscaler/upscale/video",
            CostFormula::TieredPerSecond {
                tier_param: "target_resolution",
                tiers: BYTEDANCE_UPSCALE,
                default_tier: "1080p",
                seconds_param: "duration",
                default_seconds: Some(10.0),
            },
        )
        .with_param(ParamSpec::optional(
            "target_resolution",
            ParamKind::Choice(&["1080p", "2k", "4k"]),
        )),
        fal("flashvsr", "FlashVSR", UpscaleVideo, "fal-ai/flashvsr/upscale/video", per_second(10_000, 10.0)),
    ]
}

fn add_audio() -> Vec<ModelDescriptor> {
    vec![
        fal("mmaudio_v2", "MMAudio V2", AddAudio, "fal-ai/mmaudio-v2", per_second(1_000, 8.0)),
        fal("thinksound", "ThinkSound", AddAudio, "fal-ai/thinksound", flat(10_000)),
        fal(
            "kling_video_to_audio",
            "Kling Video to Audio",
            AddAudio,
            "fal-ai/kling-video/video-to-audio",
            flat(35_000),
        ),
        fal("hunyuan_foley", "Hunyuan Video Foley", AddAudio, "fal-ai/hunyuan-video-foley", flat(100_000)),
    ]
}

fn elevenlabs_tts(key: &'static str, name: &'static str, remote: &'static str, micros: i64) -> ModelDescriptor {
    ModelDescriptor::new(
        key,
        name,
        TextToSpeech,
        ProviderId::ElevenLabs,
        "v1/text-to-speech",
        per_kchars(micros),
    )
    .with_remote_model(remote)
}

fn text_to_speech() -> Vec<ModelDescriptor> {
    vec![
        elevenlabs_tts("elevenlabs_v3", "Eleven v3", "eleven_v3", 100_000),
        elevenlabs_tts(
            "elevenlabs_multilingual_v2",
            "Eleven Multilingual v2",
            "eleven_multilingual_v2",
            100_000,
        ),
        elevenlabs_tts("elevenlabs_turbo_v2_5", "Eleven Turbo v2.5", "eleven_turbo_v2_5", 50_000),
        elevenlabs_tts("elevenlabs_flash_v2_5", "Eleven Flash v2.5", "eleven_flash_v2_5", 50_000),
        fal(
            "minimax_speech_02_hd",
            "MiniMax Speech-02 HD",
            TextToSpeech,
            "fal-ai/minimax/speech-02-hd",
            per_kchars(100_000),
        ),
        fal("kokoro_tts", "Kokoro", TextToSpeech, "fal-ai/kokoro/american-english", per_kchars(20_000)),
        fal(
            "chatterbox_tts",
            "Chatterbox",
            TextToSpeech,
            "fal-ai/chatterbox/text-to-speech",
            per_kchars(25_000),
        ),
    ]
}

fn speech_to_text() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new(
            "elevenlabs_scribe",
            "ElevenLabs Scribe",
            SpeechToText,
            ProviderId::ElevenLabs,
            "v1/speech-to-text",
            per_second(111, 60.0),
        )
        .with_remote_model("scribe_v1"),
        fal("whisper", "Whisper", SpeechToText, "fal-ai/whisper", per_second(200, 60.0)),
        fal("wizper", "Wizper", SpeechToText, "fal-ai/wizper", per_second(100, 60.0)),
    ]
}

fn image_understanding() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new(
            "gemini_flash_vision",
            "Gemini 2.5 Flash",
            ImageUnderstanding,
            ProviderId::Gemini,
            "models/gemini-2.5-flash:generateContent",
            flat(1_000),
        ),
        ModelDescriptor::new(
            "gemini_pro_vision",
            "Gemini 2.5 Pro",
            ImageUnderstanding,
            ProviderId::Gemini,
            "models/gemini-2.5-pro:generateContent",
            flat(5_000),
        ),
        fal(
            "florence_2_caption",
            "Florence-2 Detailed Caption",
            ImageUnderstanding,
            "fal-ai/florence-2-large/detailed-caption",
            flat(500),
        ),
        fal("moondream2", "Moondream 2", ImageUnderstanding, "fal-ai/moondream2", flat(500)),
    ]
}

fn prompt_generation() -> Vec<ModelDescriptor> {
    vec![
        openrouter("claude_sonnet_prompt", "Claude Sonnet 4", "anthropic/claude-sonnet-4", 10_000),
        openrouter("gpt4o_prompt", "GPT-4o", "openai/gpt-4o", 8_000),
        openrouter("gemini_flash_prompt", "Gemini 2.5 Flash", "google/gemini-2.5-flash", 1_000),
        openrouter(
            "llama_prompt",
            "Llama 3.3 70B Instruct",
            "meta-llama/llama-3.3-70b-instruct",
            1_000,
        ),
        openrouter("deepseek_prompt", "DeepSeek V3", "deepseek/deepseek-chat", 2_000),
    ]
}
