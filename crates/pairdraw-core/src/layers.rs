//! Layer stack: the per-peer drawing model.
//!
//! Layers are composited in index order, so index 0 is the back. In the layer list
//! index 0 is shown first: moving a layer "up" moves it toward index 0. The stack
//! always holds at least one layer and the selected index always points at an
//! existing layer.

use crate::raster::Raster;

/// Edge length of layer thumbnails.
pub const THUMBNAIL_SIZE: u32 = 80;

/// One raster surface in the stack.
#[derive(Debug, Clone)]
pub struct Layer {
    surface: Raster,
}

impl Layer {
    /// Create an empty layer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Raster::new(width, height),
        }
    }

    pub fn surface(&self) -> &Raster {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Raster {
        &mut self.surface
    }

    /// Reset pixels; the layer itself persists.
    pub fn clear(&mut self) {
        self.surface.clear();
    }
}

/// Ordered stack of layers plus the active-layer selection.
#[derive(Debug, Clone)]
pub struct LayerStack {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    selected: usize,
}

impl LayerStack {
    /// Create a stack with one empty, selected layer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: vec![Layer::new(width, height)],
            selected: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of layers (always at least one).
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false; kept alongside `len`.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers bottom to front.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Append an empty layer at the top and select it. Returns its index.
    pub fn add_layer(&mut self) -> usize {
        self.layers.push(Layer::new(self.width, self.height));
        self.selected = self.layers.len() - 1;
        self.selected
    }

    /// Select a layer. Out-of-range indices are ignored.
    pub fn select_layer(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.selected = index;
        true
    }

    /// Remove a layer. Refused when it is the last one or the index is out of range.
    pub fn delete_layer(&mut self, index: usize) -> bool {
        if self.layers.len() <= 1 || index >= self.layers.len() {
            return false;
        }
        self.layers.remove(index);
        if self.selected >= self.layers.len() {
            self.selected = self.layers.len() - 1;
        }
        true
    }

    /// Swap a layer with its predecessor in the list (toward index 0).
    /// Selection follows the layers.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        self.swap(index, index - 1);
        true
    }

    /// Swap a layer with its successor in the list. Selection follows the layers.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.layers.len() {
            return false;
        }
        self.swap(index, index + 1);
        true
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.layers.swap(a, b);
        if self.selected == a {
            self.selected = b;
        } else if self.selected == b {
            self.selected = a;
        }
    }

    /// Clear a layer's pixels.
    pub fn clear_layer(&mut self, index: usize) -> bool {
        match self.layers.get_mut(index) {
            Some(layer) => {
                layer.clear();
                true
            }
            None => false,
        }
    }

    /// Flatten all layers bottom to front at full opacity.
    pub fn composite(&self) -> Raster {
        let mut frame = Raster::new(self.width, self.height);
        for layer in &self.layers {
            frame.draw_over(layer.surface());
        }
        frame
    }

    /// Downscaled preview of one layer.
    pub fn thumbnail(&self, index: usize, size: u32) -> Option<Raster> {
        self.layers
            .get(index)
            .map(|layer| layer.surface().scaled(size, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pen::Rgb;
    use kurbo::Point;

    fn paint(stack: &mut LayerStack, index: usize, color: Rgb) {
        stack.layer_mut(index).unwrap().surface_mut().stroke_segment(
            Point::new(0.0, 5.0),
            Point::new(10.0, 5.0),
            10.0,
            color,
            1.0,
        );
    }

    #[test]
    fn test_starts_with_one_selected_layer() {
        let stack = LayerStack::new(10, 10);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.selected_index(), 0);
        assert!(!stack.is_empty());
    }

    #[test]
    fn test_add_selects_new_layer() {
        let mut stack = LayerStack::new(10, 10);
        assert_eq!(stack.add_layer(), 1);
        assert_eq!(stack.add_layer(), 2);
        assert_eq!(stack.selected_index(), 2);
    }

    #[test]
    fn test_select_out_of_range_is_ignored() {
        let mut stack = LayerStack::new(10, 10);
        stack.add_layer();
        stack.select_layer(0);
        assert!(!stack.select_layer(2));
        assert_eq!(stack.selected_index(), 0);
    }

    #[test]
    fn test_cannot_delete_last_layer() {
        let mut stack = LayerStack::new(10, 10);
        assert!(!stack.delete_layer(0));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_delete_clamps_selection() {
        let mut stack = LayerStack::new(10, 10);
        stack.add_layer();
        stack.add_layer();
        assert!(stack.delete_layer(2));
        assert_eq!(stack.selected_index(), 1);
        assert!(!stack.delete_layer(5));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_move_swaps_and_selection_follows() {
        let mut stack = LayerStack::new(10, 10);
        paint(&mut stack, 0, Rgb::new(255, 0, 0));
        stack.add_layer();
        stack.select_layer(0);
        let red = stack.layer(0).unwrap().surface().clone();

        assert!(stack.move_down(0));
        assert_eq!(stack.layer(1).unwrap().surface(), &red);
        assert_eq!(stack.selected_index(), 1);

        assert!(!stack.move_down(1));
        assert!(stack.move_up(1));
        assert_eq!(stack.layer(0).unwrap().surface(), &red);
        assert_eq!(stack.selected_index(), 0);
        assert!(!stack.move_up(0));
    }

    #[test]
    fn test_composite_front_wins() {
        let mut stack = LayerStack::new(10, 10);
        paint(&mut stack, 0, Rgb::new(255, 0, 0));
        stack.add_layer();
        paint(&mut stack, 1, Rgb::new(0, 255, 0));

        assert_eq!(stack.composite().pixel(5, 5), Some([0, 255, 0, 255]));
        assert!(stack.move_up(1));
        assert_eq!(stack.composite().pixel(5, 5), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_clear_keeps_layer() {
        let mut stack = LayerStack::new(10, 10);
        paint(&mut stack, 0, Rgb::BLACK);
        assert!(stack.clear_layer(0));
        assert_eq!(stack.len(), 1);
        assert!(stack.composite().is_blank());
        assert!(!stack.clear_layer(3));
    }

    #[test]
    fn test_thumbnail() {
        let stack = LayerStack::new(200, 100);
        let thumb = stack.thumbnail(0, THUMBNAIL_SIZE).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (80, 80));
        assert!(stack.thumbnail(1, THUMBNAIL_SIZE).is_none());
    }
}
