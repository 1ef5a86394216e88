//! プロンプト定義
//!
//! 修復エンドポイントが画像生成モデルへ送る固定指示

/// 修復プロンプト（切り抜き・補正 → 修復 → カラー化）
pub const RESTORE_PROMPT: &str = r#"You are a professional AI photo digitizer and restorer.
TASK 1: OBJECT DETECTION & CROPPING. Detect the actual old photograph within this real-life shot. Crop out any desk, hands, or background elements. Perform perspective correction to make the photo rectangular.
TASK 2: RESTORATION. Faithfully restore this image with high fidelity to modern photograph quality. Remove scratches, dust, and noise. Sharpen the facial details.
TASK 3: COLORIZATION. Add natural, historically accurate colors in full color.
OUTPUT: Return ONLY the cropped and fully restored image."#;
